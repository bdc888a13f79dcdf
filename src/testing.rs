use anyhow::{anyhow, Result};
use axum::Router;
use tempfile::TempDir;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{config::ServerConfig, queue::QueueListener, routes::create_routes, service::Service};

/// A service backed by a throwaway local directory and an in-memory queue.
pub struct TestService {
    pub service: Service,
    _temp_dir: TempDir,
}

impl TestService {
    pub async fn new() -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let temp_dir = tempfile::tempdir()?;
        let storage_root = temp_dir
            .path()
            .to_str()
            .ok_or_else(|| anyhow!("temp dir is not valid utf-8"))?;

        let cfg = ServerConfig {
            storage_connection_string: Some(format!("file://{}", storage_root)),
            ..Default::default()
        };
        let service = Service::new(cfg).await?;

        Ok(Self {
            service,
            _temp_dir: temp_dir,
        })
    }

    pub fn router(&self) -> Router {
        create_routes(self.service.route_state.clone())
    }

    pub fn queue_listener(&mut self) -> Result<QueueListener> {
        self.service
            .take_queue_listener()
            .ok_or_else(|| anyhow!("queue listener already taken"))
    }
}
