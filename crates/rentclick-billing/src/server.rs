//! HTTP server wiring: shared state, router and lifecycle

use crate::{
    api,
    config::{RentalConfig, StorageBackend},
    domain::{CustomerManager, LifecycleController, LifecycleOperations, VehicleManager},
    files::{FileStorage, LocalFileStorage},
    notifications::Notifier,
    storage::{DatabaseConnection, Repositories},
};
use anyhow::{anyhow, Context};
use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use rentclick_common::{Clock, SystemClock};
use std::future::Future;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::oneshot};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RentalConfig>,

    /// Raw repositories, used by the read-only views
    pub repositories: Repositories,

    pub lifecycle: Arc<dyn LifecycleOperations>,
    pub vehicles: Arc<VehicleManager>,
    pub customers: Arc<CustomerManager>,

    pub notifier: Arc<Notifier>,
    pub files: Arc<dyn FileStorage>,

    /// Source of "now" for every billing computation
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: RentalConfig,
        repositories: Repositories,
        files: Arc<dyn FileStorage>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let lifecycle: Arc<dyn LifecycleOperations> =
            Arc::new(LifecycleController::from_repositories(&repositories));
        let vehicles = Arc::new(VehicleManager::new(
            repositories.vehicles.clone(),
            repositories.rentals.clone(),
            files.clone(),
        ));
        let customers = Arc::new(CustomerManager::new(
            repositories.customers.clone(),
            repositories.rentals.clone(),
            files.clone(),
            notifier.clone(),
        ));

        Self {
            config: Arc::new(config),
            repositories,
            lifecycle,
            vehicles,
            customers,
            notifier,
            files,
            clock,
        }
    }
}

pub struct RentalServer {
    state: AppState,
    database: Option<Arc<DatabaseConnection>>,
}

impl RentalServer {
    pub async fn new_with_config(config: RentalConfig) -> anyhow::Result<Self> {
        info!("Initializing rental server");
        config.validate()?;

        let (repositories, database) = match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                (Repositories::in_memory(), None)
            }
            StorageBackend::Postgres => {
                let connection = Arc::new(
                    DatabaseConnection::new(&config.storage.database)
                        .await
                        .context("Failed to connect to database")?,
                );
                (Repositories::postgres(connection.clone()), Some(connection))
            }
        };

        let files: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
            config.files.root_dir.clone(),
            config.files.public_base_url.clone(),
        ));
        let notifier = Arc::new(Notifier::from_config(&config.notifications)?);

        let state = AppState::new(config, repositories, files, notifier, Arc::new(SystemClock));
        Ok(Self { state, database })
    }

    pub fn from_state(state: AppState) -> Self {
        Self {
            state,
            database: None,
        }
    }

    /// Apply pending migrations when the postgres backend is enabled
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        match &self.database {
            Some(connection) if self.state.config.storage.database.run_migrations => {
                connection.run_migrations().await?;
                info!("Migrations completed successfully");
            }
            Some(_) => info!("Skipping migrations (disabled in configuration)"),
            None => {}
        }
        Ok(())
    }

    pub fn router(&self) -> anyhow::Result<Router> {
        build_router(self.state.clone())
    }

    pub async fn run_with_listener(
        self,
        listener: TcpListener,
        shutdown_signal: oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        let app = self.router()?;
        let addr = listener.local_addr()?;
        info!("RentClick billing listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_signal.await;
            })
            .await
            .map_err(|e| anyhow!("HTTP server error: {}", e))?;

        self.shutdown().await;
        Ok(())
    }

    pub async fn serve(
        self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = self.state.config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow!("Failed to bind to {}: {}", addr, e))?;

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            shutdown_signal.await;
            let _ = tx.send(());
        });

        self.run_with_listener(listener, rx).await
    }

    async fn shutdown(self) {
        info!("Shutting down rental server");
        if let Some(connection) = self.database {
            info!("Closing database connections");
            connection.pool().close().await;
        }
    }
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| anyhow!("Invalid CORS origin {}: {}", origin, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Build the application router with all routes and middleware
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config.http.cors_allowed_origins)?);

    let app = Router::new()
        .nest("/api", api::routes())
        .merge(api::file_routes())
        .layer(DefaultBodyLimit::max(state.config.http.max_upload_bytes))
        .layer(middleware)
        .with_state(state);

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer(&[]).is_ok());
        assert!(cors_layer(&["https://shop.example".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
