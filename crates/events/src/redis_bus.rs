//! Redis pub/sub implementation of [`MessageBus`].
//!
//! Publishing goes through a shared [`ConnectionManager`]. Receiving needs a
//! dedicated connection in subscriber mode, owned by a single pump task:
//! subscribe/unsubscribe requests are sent to the pump over a command
//! channel, and every inbound message is forwarded into a local broadcast
//! channel. The pump stops when its [`CancellationToken`] fires.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusMessage, MessageBus, DEFAULT_CAPACITY};
use crate::error::BusError;

/// Pending subscription changes the pump may queue before callers block.
const COMMAND_BUFFER: usize = 256;

enum Command {
    Subscribe(String, oneshot::Sender<redis::RedisResult<()>>),
    Unsubscribe(String, oneshot::Sender<redis::RedisResult<()>>),
}

enum Step {
    Command(Command),
    Message(redis::Msg),
    Stop(&'static str),
}

/// [`MessageBus`] over a shared Redis server.
pub struct RedisMessageBus {
    publisher: ConnectionManager,
    commands: mpsc::Sender<Command>,
    sender: broadcast::Sender<BusMessage>,
}

impl RedisMessageBus {
    /// Connect both the publishing and the subscribing side and start the
    /// inbound pump.
    ///
    /// Returns the bus and the pump's join handle; cancel `shutdown` to
    /// stop the pump.
    pub async fn connect(
        redis_url: &str,
        shutdown: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), BusError> {
        let client = redis::Client::open(redis_url)?;
        let publisher = client.get_connection_manager().await?;
        let pubsub = client.get_async_pubsub().await?;

        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let handle = tokio::spawn(pump(pubsub, command_rx, sender.clone(), shutdown));
        tracing::info!("Redis message bus connected");

        Ok((
            Self {
                publisher,
                commands,
                sender,
            },
            handle,
        ))
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<redis::RedisResult<()>>) -> Command,
    ) -> Result<(), BusError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| BusError::Closed)?;
        response.await.map_err(|_| BusError::Closed)??;
        Ok(())
    }
}

#[async_trait]
impl MessageBus for RedisMessageBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        tracing::trace!(channel, receivers, "Published to bus");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BusError> {
        let channel = channel.to_string();
        self.request(|reply| Command::Subscribe(channel, reply)).await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        let channel = channel.to_string();
        self.request(|reply| Command::Unsubscribe(channel, reply)).await
    }

    fn messages(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

/// Own the subscriber connection: apply subscription commands and forward
/// inbound messages until cancelled.
async fn pump(
    mut pubsub: PubSub,
    mut commands: mpsc::Receiver<Command>,
    sender: broadcast::Sender<BusMessage>,
    shutdown: CancellationToken,
) {
    loop {
        let step = {
            let mut inbound = std::pin::pin!(pubsub.on_message());
            tokio::select! {
                () = shutdown.cancelled() => Step::Stop("shutdown requested"),
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Stop("bus handle dropped"),
                },
                msg = inbound.next() => match msg {
                    Some(msg) => Step::Message(msg),
                    None => Step::Stop("subscriber connection closed"),
                },
            }
        };

        match step {
            Step::Command(Command::Subscribe(channel, reply)) => {
                let result = pubsub.subscribe(&channel).await;
                if let Err(e) = &result {
                    tracing::error!(channel = %channel, error = %e, "Bus subscribe failed");
                }
                let _ = reply.send(result);
            }
            Step::Command(Command::Unsubscribe(channel, reply)) => {
                let result = pubsub.unsubscribe(&channel).await;
                if let Err(e) = &result {
                    tracing::error!(channel = %channel, error = %e, "Bus unsubscribe failed");
                }
                let _ = reply.send(result);
            }
            Step::Message(msg) => {
                let channel = msg.get_channel_name().to_string();
                match msg.get_payload::<String>() {
                    Ok(payload) => {
                        // Ignore the SendError; it only means the relay is gone.
                        let _ = sender.send(BusMessage { channel, payload });
                    }
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Dropping undecodable bus message");
                    }
                }
            }
            Step::Stop(reason) => {
                tracing::info!(reason, "Redis bus pump stopping");
                break;
            }
        }
    }
}
