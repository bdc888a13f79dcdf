use std::{net::SocketAddr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use axum_server::Handle;
use blob_store::{BlobStorage, FileShare, StorageAccount};
use table_store::TableServiceClient;
use tokio::{self, signal, sync::watch};
use tracing::{error, info};

use crate::{
    config::ServerConfig,
    queue::{Queue, QueueListener},
    routes::{create_routes, RouteState},
};

pub struct Service {
    pub config: ServerConfig,
    pub shutdown_tx: watch::Sender<()>,
    pub shutdown_rx: watch::Receiver<()>,
    pub route_state: RouteState,
    queue_listener: Option<QueueListener>,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let connection_string = config
            .storage_connection_string
            .as_deref()
            .ok_or_else(|| anyhow!("storage connection string is not configured"))?;
        let account = StorageAccount::from_connection_string(connection_string)
            .context("error initializing storage account")?;

        let tables = TableServiceClient::new(&account)?;
        let customers = tables.get_table_client(&config.tables.customers)?;
        let orders = tables.get_table_client(&config.tables.orders)?;
        let products = tables.get_table_client(&config.tables.products)?;

        let blob_storage = BlobStorage::new(&account, &config.blob_container)
            .await
            .context("error initializing BlobStorage")?;

        let file_share = FileShare::new(&account, &config.file_share.share_name)?;
        let share_directory = file_share.directory(&config.file_share.directory);

        let (order_queue, queue_listener) = Queue::new(&config.order_queue)
            .await
            .context("error initializing order queue")?;

        let route_state = RouteState {
            customers: Arc::new(customers),
            orders: Arc::new(orders),
            products: Arc::new(products),
            file_share: Arc::new(file_share),
            share_directory: Arc::new(share_directory),
            blob_storage: Arc::new(blob_storage),
            order_queue: Arc::new(order_queue),
        };

        Ok(Self {
            config,
            shutdown_tx,
            shutdown_rx,
            route_state,
            queue_listener: Some(queue_listener),
        })
    }

    /// Hands the queue listener to the caller instead of running it in
    /// [`Service::start`].
    #[cfg(test)]
    pub fn take_queue_listener(&mut self) -> Option<QueueListener> {
        self.queue_listener.take()
    }

    pub async fn start(&mut self) -> Result<()> {
        if let Some(queue_listener) = self.queue_listener.take() {
            let shutdown_rx = self.shutdown_rx.clone();
            tokio::spawn(queue_listener.start(shutdown_rx));
        }

        let handle = Handle::new();
        let handle_sh = handle.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh, shutdown_tx).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(self.route_state.clone());
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle, shutdown_tx: watch::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
    if shutdown_tx.send(()).is_err() {
        error!("no background task is listening for shutdown");
    }
    info!("signal received, shutting down server gracefully");
}
