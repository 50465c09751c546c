//! Infrastructure layer: stores, services, config.

pub mod config;
pub mod seed;
pub mod services;
pub mod store;


use std::sync::Arc;

use config::{AppConfig, StoreBackend};
use store::{InMemoryStore, PostgresStore, SharedStore, StoreError};

const PG_MAX_CONNECTIONS: u32 = 10;

/// Open the configured backend, apply the schema and seed plans if enabled.
pub async fn open_store(config: &AppConfig) -> Result<SharedStore, StoreError> {
    let store: SharedStore = match &config.backend {
        StoreBackend::InMemory => {
            tracing::info!("using in-memory stores");
            Arc::new(InMemoryStore::new())
        }
        StoreBackend::Postgres { database_url } => {
            tracing::info!("using postgres stores");
            let pg = PostgresStore::connect(database_url, PG_MAX_CONNECTIONS).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
    };

    if config.seed_plans {
        seed::seed_default_plans(store.as_ref()).await?;
    }
    Ok(store)
}
