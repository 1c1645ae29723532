use async_trait::async_trait;
use sqlx::query;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{NotificationsRepo, RepoError},
    domain::entities::NotificationRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    title: String,
    body: String,
    reference_id: Option<String>,
    provider_message_id: String,
    sender: String,
    sent_at: OffsetDateTime,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            recipient_id: row.recipient_id,
            title: row.title,
            body: row.body,
            reference_id: row.reference_id,
            provider_message_id: row.provider_message_id,
            sender: row.sender,
            sent_at: row.sent_at,
        }
    }
}

#[async_trait]
impl NotificationsRepo for PostgresRepositories {
    async fn append_notification(&self, record: &NotificationRecord) -> Result<(), RepoError> {
        query(
            "INSERT INTO notifications \
             (id, recipient_id, title, body, reference_id, provider_message_id, sender, sent_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(record.recipient_id)
        .bind(&record.title)
        .bind(&record.body)
        .bind(&record.reference_id)
        .bind(&record.provider_message_id)
        .bind(&record.sender)
        .bind(record.sent_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepoError> {
        let limit = i64::from(limit.clamp(1, 200));

        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, recipient_id, title, body, reference_id, provider_message_id, sender, sent_at \
             FROM notifications ORDER BY sent_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }
}
