use std::fmt;

use async_nats::{Client, ConnectOptions, Subscriber};
use futures_util::StreamExt;
use propmon_config::BrokerConfig;
use propmon_core::{IngestError, Ingestor, MessageKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const CLIENT_NAME: &str = "propmon";

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("failed to connect to {address} after {attempts} attempts")]
    Connect {
        address: String,
        attempts: u32,
        #[source]
        source: async_nats::ConnectError,
    },
    #[error("failed to subscribe to {subject}")]
    Subscribe {
        subject: &'static str,
        #[source]
        source: async_nats::SubscribeError,
    },
}

/// Connects to the broker, retrying with a fixed pause up to
/// `connect_attempts` times.
pub async fn connect_with_retry(
    config: &BrokerConfig,
) -> Result<Client, BrokerError> {
    let attempts = config.connect_attempts.max(1);
    let mut attempt = 1;

    loop {
        match ConnectOptions::new()
            .name(CLIENT_NAME)
            .connect(config.address.as_str())
            .await
        {
            Ok(client) => {
                info!(address = %config.address, attempt, "connected to broker");
                return Ok(client);
            }
            Err(source) if attempt >= attempts => {
                return Err(BrokerError::Connect {
                    address: config.address.clone(),
                    attempts,
                    source,
                });
            }
            Err(err) => {
                warn!(
                    address = %config.address,
                    attempt,
                    backoff = ?config.connect_backoff,
                    error = %err,
                    "broker connection failed, retrying"
                );
                tokio::time::sleep(config.connect_backoff).await;
                attempt += 1;
            }
        }
    }
}

/// One subscription loop per message kind, all stopped by a shared token.
pub struct BrokerListener {
    client: Client,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl fmt::Debug for BrokerListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerListener")
            .field("tasks", &self.tasks.len())
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BrokerListener {
    /// Subscribes to every proposal subject and spawns the receive loops.
    ///
    /// Fails without spawning anything if any subscription is refused.
    pub async fn start(
        client: Client,
        ingestor: Ingestor,
    ) -> Result<Self, BrokerError> {
        let mut subscriptions = Vec::with_capacity(MessageKind::ALL.len());
        for kind in MessageKind::ALL {
            let subject = kind.subscription();
            let subscriber =
                client.subscribe(subject).await.map_err(|source| {
                    BrokerError::Subscribe { subject, source }
                })?;
            debug!(subject, "subscribed");
            subscriptions.push((kind, subscriber));
        }

        let shutdown = CancellationToken::new();
        let tasks = subscriptions
            .into_iter()
            .map(|(kind, subscriber)| {
                tokio::spawn(receive(
                    kind,
                    subscriber,
                    ingestor.clone(),
                    shutdown.child_token(),
                ))
            })
            .collect();

        info!("listening for proposal messages");
        Ok(Self {
            client,
            shutdown,
            tasks,
        })
    }

    /// Cancels the receive loops, waits for them and flushes the client.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "subscription task ended abnormally");
            }
        }
        if let Err(err) = self.client.flush().await {
            debug!(error = %err, "broker flush failed during shutdown");
        }
        info!("broker listener stopped");
    }
}

async fn receive(
    kind: MessageKind,
    mut subscriber: Subscriber,
    ingestor: Ingestor,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => break,
            message = subscriber.next() => message,
        };
        let Some(message) = message else {
            warn!(%kind, "subscription closed by broker");
            return;
        };

        match ingestor.handle_subject(message.subject.as_str(), &message.payload)
        {
            Ok(applied) => trace!(%kind, ?applied, "handled message"),
            Err(IngestError::UnknownSubject(subject)) => {
                debug!(%kind, subject, "ignoring message on unexpected subject");
            }
            // Decode failures are logged and counted by the ingestor.
            Err(_) => {}
        }
    }

    if let Err(err) = subscriber.unsubscribe().await {
        debug!(%kind, error = %err, "unsubscribe failed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn gives_up_after_configured_attempts() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind probe");
        let port = listener.local_addr().expect("probe addr").port();
        drop(listener);

        let config = BrokerConfig {
            address: format!("nats://127.0.0.1:{port}"),
            connect_attempts: 2,
            connect_backoff: Duration::from_millis(10),
        };

        match connect_with_retry(&config).await {
            Err(BrokerError::Connect { attempts, address, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(address, config.address);
            }
            Ok(_) => panic!("connected to a closed port"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
