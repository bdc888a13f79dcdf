use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use omniqueue::{
    backends::{InMemoryBackend, SqsBackend, SqsConfig},
    DynConsumer,
    DynProducer,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{QueueBackend, QueueConfig};

const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Producer side of a named queue.
pub struct Queue {
    name: String,
    producer: Arc<DynProducer>,
}

impl Queue {
    /// Connects to the configured backend and returns the producer together
    /// with the listener that consumes the same queue.
    pub async fn new(config: &QueueConfig) -> Result<(Queue, QueueListener)> {
        let (producer, consumer) = match &config.backend {
            QueueBackend::InMemory => {
                info!(queue = %config.name, "using in-memory queue");
                InMemoryBackend::builder()
                    .make_dynamic()
                    .build_pair()
                    .await?
            }
            QueueBackend::AmazonSqs { queue_url } => {
                info!(queue = %config.name, "using sqs queue config with url: {queue_url}");

                let sqs_config = SqsConfig {
                    queue_dsn: queue_url.clone(),
                    override_endpoint: false,
                };

                SqsBackend::builder(sqs_config)
                    .make_dynamic()
                    .build_pair()
                    .await?
            }
        };

        Ok((
            Queue {
                name: config.name.clone(),
                producer: Arc::new(producer),
            },
            QueueListener {
                queue_name: config.name.clone(),
                consumer,
            },
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send_json<P: Serialize + Sync>(&self, payload: &P) -> Result<()> {
        self.producer
            .send_serde_json(payload)
            .await
            .inspect_err(|e| error!(queue = %self.name, "unable to send message: {}", e))?;
        Ok(())
    }
}

/// Consumer side of a named queue: logs every message it receives.
pub struct QueueListener {
    queue_name: String,
    consumer: DynConsumer,
}

impl QueueListener {
    pub async fn start(mut self, mut shutdown_rx: watch::Receiver<()>) {
        let queue_name = self.queue_name.clone();
        info!(queue = %queue_name, "queue listener started");
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!(queue = %queue_name, "queue listener shutting down");
                    break;
                }
                result = self.process_next() => {
                    if let Err(err) = result {
                        error!(queue = %queue_name, "error processing queue message: {:?}", err);
                        tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }

    /// Waits for the next message, logs its text and acknowledges it.
    /// Returns the logged text.
    pub async fn process_next(&mut self) -> Result<String> {
        let delivery = self.consumer.receive().await?;
        let text = delivery
            .borrow_payload()
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
            .unwrap_or_default();

        info!(
            queue = %self.queue_name,
            "queue trigger function processed: {}", text
        );

        delivery
            .ack()
            .await
            .map_err(|(e, _)| anyhow!("unable to ack message: {}", e))?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let (queue, mut listener) = Queue::new(&QueueConfig::default()).await.unwrap();
        assert_eq!(queue.name(), "order");

        queue
            .send_json(&json!({"ProductName": "Desk", "Quantity": 2}))
            .await
            .unwrap();

        let text = listener.process_next().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["ProductName"], "Desk");
        assert_eq!(value["Quantity"], 2);
    }

    #[tokio::test]
    async fn test_non_utf8_payload_is_logged_lossily() {
        let (queue, mut listener) = Queue::new(&QueueConfig::default()).await.unwrap();
        queue.producer.send_raw(&[b'o', b'k', 0xff]).await.unwrap();

        let text = listener.process_next().await.unwrap();
        assert_eq!(text, "ok\u{FFFD}");
    }

    #[tokio::test]
    async fn test_listener_stops_on_shutdown() {
        let (_queue, listener) = Queue::new(&QueueConfig::default()).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = tokio::spawn(listener.start(shutdown_rx));
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
