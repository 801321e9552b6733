//! Infrastructure wiring for the HTTP layer.

use std::sync::Arc;

use roster_infra::{Directory, InMemoryDirectory, PostgresDirectory, StoreResult};

use crate::config::AppConfig;

/// Shared state handed to every handler through an `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub directory: Arc<dyn Directory>,
}

impl AppServices {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Fresh, empty in-memory directory (dev and tests).
    pub fn in_memory() -> Self {
        Self::new(InMemoryDirectory::arc())
    }
}

/// Select the directory backend from configuration.
///
/// With `DATABASE_URL` set, connects to Postgres and makes sure the tables
/// exist. Otherwise everything lives in process memory and is lost on exit.
pub async fn build_services(config: &AppConfig) -> StoreResult<AppServices> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory directory (data is not persisted)");
        return Ok(AppServices::in_memory());
    };

    let directory = PostgresDirectory::connect(url, config.db_max_connections).await?;
    directory.ensure_schema().await?;
    tracing::info!(
        max_connections = config.db_max_connections,
        "connected to postgres"
    );

    Ok(AppServices::new(Arc::new(directory)))
}
