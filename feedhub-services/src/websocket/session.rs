//! Client session halves
//!
//! A session is two cooperating tasks sharing one outbound queue. The
//! inbound half reads frames under the liveness deadline and routes them
//! to subscriptions. The outbound half writes queued payloads and
//! keepalive pings under the write deadline. Whichever half ends first
//! ends the session.

use feedhub_core::Envelope;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::config::SessionConfig;
use super::hub::SessionId;
use super::subscription::SubscriptionMap;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame or the stream ended
    PeerClosed,
    /// Reading from the transport failed
    ReadError(String),
    /// Nothing was read within the liveness deadline
    LivenessTimeout,
    /// An inbound frame exceeded the size limit
    MessageTooLarge,
    /// Writing to the transport failed
    WriteError(String),
    /// A write did not complete within the write deadline
    WriteTimeout,
    /// The hub closed the outbound queue
    QueueClosed,
    /// A session task stopped unexpectedly
    Aborted,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::ReadError(e) => write!(f, "read error: {}", e),
            CloseReason::LivenessTimeout => write!(f, "liveness deadline expired"),
            CloseReason::MessageTooLarge => write!(f, "message too large"),
            CloseReason::WriteError(e) => write!(f, "write error: {}", e),
            CloseReason::WriteTimeout => write!(f, "write deadline expired"),
            CloseReason::QueueClosed => write!(f, "outbound queue closed"),
            CloseReason::Aborted => write!(f, "aborted"),
        }
    }
}

/// Session lifecycle notification for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened { id: SessionId },
    Closed { id: SessionId, reason: CloseReason },
}

/// Read frames until the transport fails, the peer leaves or the liveness
/// deadline passes
pub(crate) async fn inbound_half<R, E>(
    id: SessionId,
    reader: &mut R,
    subscriptions: &SubscriptionMap,
    config: &SessionConfig,
) -> CloseReason
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        // Every successful read refreshes the deadline
        let message = match timeout(config.pong_wait, reader.next()).await {
            Err(_) => return CloseReason::LivenessTimeout,
            Ok(None) => return CloseReason::PeerClosed,
            Ok(Some(Err(e))) => return CloseReason::ReadError(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                if text.as_str().len() > config.max_message_size {
                    return CloseReason::MessageTooLarge;
                }

                match Envelope::parse(text.as_str()) {
                    Ok(envelope) => {
                        subscriptions.dispatch(envelope);
                    }
                    Err(e) => debug!(session = %id, "Dropping malformed frame: {}", e),
                }
            }
            Message::Binary(data) => {
                if data.len() > config.max_message_size {
                    return CloseReason::MessageTooLarge;
                }
                debug!(session = %id, "Ignoring binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {
                trace!(session = %id, "Control frame");
            }
            Message::Close(_) => return CloseReason::PeerClosed,
            Message::Frame(_) => {}
        }
    }
}

/// Write queued payloads and keepalive pings until the hub closes the queue
/// or a write fails
pub(crate) async fn outbound_half<W, E>(
    id: SessionId,
    mut writer: W,
    mut queue: mpsc::Receiver<String>,
    mut closed: oneshot::Receiver<()>,
    config: SessionConfig,
) -> CloseReason
where
    W: Sink<Message, Error = E> + Unpin,
    E: Display,
{
    let mut keepalive = interval_at(Instant::now() + config.ping_period, config.ping_period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            biased;

            // Fires on unregister, or when the hub drops the handle
            _ = &mut closed => break CloseReason::QueueClosed,

            frame = queue.recv() => {
                let Some(frame) = frame else {
                    break CloseReason::QueueClosed;
                };
                if let Err(reason) = write_frame(&mut writer, Message::text(frame), config.write_wait).await {
                    break reason;
                }
            }

            _ = keepalive.tick() => {
                trace!(session = %id, "Sending keepalive ping");
                if let Err(reason) = write_frame(&mut writer, Message::Ping(Vec::new().into()), config.write_wait).await {
                    break reason;
                }
            }
        }
    };

    // Best effort: the transport may already be gone
    let _ = write_frame(&mut writer, Message::Close(None), config.write_wait).await;
    debug!(session = %id, %reason, "Outbound half finished");
    reason
}

async fn write_frame<W, E>(writer: &mut W, message: Message, write_wait: Duration) -> Result<(), CloseReason>
where
    W: Sink<Message, Error = E> + Unpin,
    E: Display,
{
    match timeout(write_wait, writer.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CloseReason::WriteError(e.to_string())),
        Err(_) => Err(CloseReason::WriteTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::PeerClosed.to_string(), "peer closed");
        assert_eq!(
            CloseReason::ReadError("reset".to_string()).to_string(),
            "read error: reset"
        );
        assert_eq!(CloseReason::WriteTimeout.to_string(), "write deadline expired");
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_writes_in_queue_order() {
        let (queue_tx, queue_rx) = mpsc::channel(4);
        let (close_tx, close_rx) = oneshot::channel();
        let (writer, mut written) = futures::channel::mpsc::unbounded::<Message>();

        queue_tx.send("first".to_string()).await.unwrap();
        queue_tx.send("second".to_string()).await.unwrap();

        let task = tokio::spawn(outbound_half(
            SessionId(1),
            writer,
            queue_rx,
            close_rx,
            SessionConfig::default(),
        ));

        assert_eq!(written.next().await, Some(Message::text("first".to_string())));
        assert_eq!(written.next().await, Some(Message::text("second".to_string())));

        close_tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), CloseReason::QueueClosed);
        assert_eq!(written.next().await, Some(Message::Close(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_write_error() {
        let (_queue_tx, queue_rx) = mpsc::channel::<String>(4);
        let (_close_tx, close_rx) = oneshot::channel();
        let (writer, written) = futures::channel::mpsc::unbounded::<Message>();
        drop(written);

        // The first keepalive ping hits a closed transport
        let reason = outbound_half(
            SessionId(1),
            writer,
            queue_rx,
            close_rx,
            SessionConfig::default().with_pong_wait(Duration::from_secs(10)),
        )
        .await;
        assert!(matches!(reason, CloseReason::WriteError(_)));
    }
}
