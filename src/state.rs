use std::sync::Arc;

use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::storage::StorageClient;
use crate::{db, notify, storage};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config.database_url).await?;
        let storage = storage::from_config(&config.uploads).await?;
        let notifier = notify::from_config(config.smtp.as_ref())?;

        Ok(Self::from_parts(db, config, storage, notifier))
    }

    pub fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            storage,
            notifier,
        }
    }
}
