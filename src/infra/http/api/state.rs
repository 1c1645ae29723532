use std::sync::Arc;

use crate::application::notify::DispatchService;
use crate::application::repos::NotificationsRepo;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub dispatch: Arc<DispatchService>,
    pub notifications: Arc<dyn NotificationsRepo>,
    pub db: Arc<PostgresRepositories>,
    /// Shared secret checked by the admin auth middleware.
    pub admin_token: Arc<String>,
}
