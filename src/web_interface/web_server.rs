use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use warp::Filter;

use super::routes::{api, AppState};
use crate::configuration::{DatabaseTarget, ServerConfig};
use crate::error_handling::types::WebError;
use crate::storage::database_storage::DatabaseStorage;
use crate::storage::file_storage::FileStorage;
use crate::storage::storage_trait::RecordingStore;

/// Web server exposing the recordings API and the uploads directory
pub struct WebServer {
    state: AppState,
    cors_origin: String,
    addr: SocketAddr,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(
        store: Arc<dyn RecordingStore>,
        files: Arc<FileStorage>,
        config: &ServerConfig,
    ) -> Result<Self, WebError> {
        let addr = config
            .socket_addr()
            .map_err(|e| WebError::BindFailed(e.to_string()))?;
        let state = AppState::new(
            store,
            files,
            config.public_url.clone(),
            format!("localhost:{}", config.port),
        );
        Ok(Self {
            state,
            cors_origin: config.cors_origin.trim_end_matches('/').to_string(),
            addr,
        })
    }

    /// Open the metadata store and uploads directory named by `config`.
    ///
    /// Fails with `StorageError::PendingMigrations` when the schema has not
    /// been migrated yet.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, WebError> {
        let storage = open_storage(config).await?;
        storage.ensure_schema().await?;
        let files = FileStorage::new(&config.uploads_dir, config.max_upload_bytes)?;
        Self::new(Arc::new(storage), Arc::new(files), config)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// CORS policy admitting only the configured client origin.
    pub fn cors(&self) -> warp::filters::cors::Builder {
        warp::cors()
            .allow_origin(self.cors_origin.as_str())
            .allow_methods(vec!["GET", "POST"])
            .allow_headers(vec!["content-type"])
    }

    /// Serve until the process is stopped
    pub async fn start(&self) -> Result<(), WebError> {
        let routes = api(self.state.clone())
            .with(self.cors())
            .with(warp::log("screenrec::api"));

        info!(
            "Serving recordings API on {} (uploads in {})",
            self.addr,
            self.state.files.base_path().display()
        );
        warp::serve(routes).run(self.addr).await;
        Ok(())
    }
}

/// Connect to the configured metadata store without touching its schema.
pub async fn open_storage(config: &ServerConfig) -> Result<DatabaseStorage, WebError> {
    let storage = match config.database_target() {
        DatabaseTarget::Url(url) => DatabaseStorage::connect(&url).await?,
        DatabaseTarget::Sqlite(path) => {
            info!("No DATABASE_URL set, using SQLite at {}", path.display());
            DatabaseStorage::open_sqlite(&path).await?
        }
    };
    Ok(storage)
}
