use crate::config::Config;
use crate::hub::PageHub;
use crate::service::Coordinator;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub coordinator: Coordinator,
    pub hub: Arc<PageHub>,
}
