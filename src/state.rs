use crate::config::{AppConfig, StoreKind};
use crate::users::{
    memory_repo::MemoryUserStore,
    repo::{PgUserStore, UserStore},
    services::UserService,
};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn UserStore> = match config.store {
            StoreKind::Postgres => {
                let db = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(&config.database_url)
                    .await
                    .context("connect to database")?;

                // Run migrations if present
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgUserStore::new(db))
            }
            StoreKind::Memory => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };

        Ok(Self::from_parts(Arc::new(config), store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        Self {
            config,
            users: UserService::new(store),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreKind::Memory,
            database_url: String::new(),
            host: "127.0.0.1".into(),
            port: 0,
            db_max_connections: 1,
        });
        Self::from_parts(config, Arc::new(MemoryUserStore::new()))
    }
}
