use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use rasoio_api_types::{
    BulkSendRequest, BulkSendResponse, NotificationListResponse, NotificationView,
    RecipientOutcome, SendNotificationRequest, SendNotificationResponse,
};

use crate::application::notify::{Caller, NotificationRequest};
use crate::domain::entities::NotificationRecord;
use crate::infra::http::db_health_response;

use super::error::{ApiError, codes};
use super::state::ApiState;

const DEFAULT_LIST_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

pub async fn send_notification(
    State(state): State<ApiState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<SendNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .dispatch
        .send_one(
            &caller,
            NotificationRequest {
                recipient_id: request.recipient_id,
                title: request.title,
                body: request.body,
                reference_id: request.reference_id,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendNotificationResponse {
            message_id: record.provider_message_id.clone(),
            notification: to_view(record),
        }),
    ))
}

pub async fn bulk_send(
    State(state): State<ApiState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<BulkSendRequest>,
) -> Result<Json<BulkSendResponse>, ApiError> {
    let result = state
        .dispatch
        .send_many(
            &caller,
            &request.recipient_ids,
            &request.title,
            &request.body,
        )
        .await?;

    Ok(Json(BulkSendResponse {
        total: result.total,
        successful: result.successful,
        failed: result.failed,
        results: result
            .results
            .into_iter()
            .map(|outcome| RecipientOutcome {
                recipient_id: outcome.recipient_id,
                success: outcome.success,
                error: outcome.error,
            })
            .collect(),
    }))
}

pub async fn list_notifications(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let records = state
        .notifications
        .list_recent(limit)
        .await
        .map_err(|err| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                err.to_string(),
            )
        })?;

    Ok(Json(NotificationListResponse {
        items: records.into_iter().map(to_view).collect(),
    }))
}

pub async fn healthz(State(state): State<ApiState>) -> Response {
    db_health_response(state.db.health_check().await)
}

fn to_view(record: NotificationRecord) -> NotificationView {
    NotificationView {
        id: record.id,
        recipient_id: record.recipient_id,
        title: record.title,
        body: record.body,
        reference_id: record.reference_id,
        provider_message_id: record.provider_message_id,
        sender: record.sender,
        sent_at: record.sent_at,
    }
}
