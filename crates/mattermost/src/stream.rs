use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{decode_event, EventEnvelope};

/// Bound on the in-process event queue between the pump and the dispatcher.
const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("event stream failed to connect: {0}")]
    Connect(String),
    #[error("event stream read failed: {0}")]
    Receive(String),
}

/// A lazy, effectively infinite sequence of inbound events. `Ok(None)`
/// signals an orderly end of stream; the sequence is not restartable.
#[async_trait]
pub trait EventStream: Send {
    async fn next_event(&mut self) -> Result<Option<EventEnvelope>, StreamError>;
    async fn close(&mut self);
}

pub struct WsEventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsEventStream {
    /// Opens the websocket and authenticates the session token with the
    /// server's challenge action.
    pub async fn connect(ws_url: &str, token: &str) -> Result<Self, StreamError> {
        let endpoint = format!("{}/api/v4/websocket", ws_url.trim_end_matches('/'));
        let (mut socket, _response) = connect_async(endpoint.as_str())
            .await
            .map_err(|err| StreamError::Connect(err.to_string()))?;

        let challenge = serde_json::json!({
            "seq": 1,
            "action": "authentication_challenge",
            "data": { "token": token },
        });
        socket
            .send(Message::text(challenge.to_string()))
            .await
            .map_err(|err| StreamError::Connect(err.to_string()))?;

        info!(endpoint = %endpoint, "event stream connected");
        Ok(Self { socket })
    }
}

#[async_trait]
impl EventStream for WsEventStream {
    async fn next_event(&mut self) -> Result<Option<EventEnvelope>, StreamError> {
        loop {
            let Some(frame) = self.socket.next().await else {
                return Ok(None);
            };
            let message = frame.map_err(|err| StreamError::Receive(err.to_string()))?;

            match message {
                Message::Text(text) => match decode_event(text.as_str()) {
                    Ok(envelope) => return Ok(Some(envelope)),
                    Err(error) => {
                        debug!(error = %error, "skipping undecodable event frame");
                    }
                },
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// Drains the stream into a bounded queue from a single background task.
/// The receiver closing, the stream ending, a read failure, or cancellation
/// all tear the pump down; the dispatcher observes this as a closed channel.
pub fn spawn_pump(
    mut stream: Box<dyn EventStream>,
    cancel: CancellationToken,
) -> mpsc::Receiver<EventEnvelope> {
    let (sender, receiver) = mpsc::channel(EVENT_QUEUE_DEPTH);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("event stream cancelled; closing connection");
                    stream.close().await;
                    break;
                }
                next = stream.next_event() => match next {
                    Ok(Some(envelope)) => {
                        if sender.send(envelope).await.is_err() {
                            stream.close().await;
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("event stream ended");
                        break;
                    }
                    Err(error) => {
                        warn!(error = %error, "event stream read failed; closing connection");
                        stream.close().await;
                        break;
                    }
                }
            }
        }
    });

    receiver
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::events::{ChatEvent, EventEnvelope};

    use super::{spawn_pump, EventStream, StreamError};

    struct ScriptedStream {
        events: VecDeque<Result<Option<EventEnvelope>, StreamError>>,
        close_calls: Arc<AtomicUsize>,
    }

    impl ScriptedStream {
        fn new(
            events: Vec<Result<Option<EventEnvelope>, StreamError>>,
            close_calls: Arc<AtomicUsize>,
        ) -> Self {
            Self { events: events.into(), close_calls }
        }
    }

    #[async_trait]
    impl EventStream for ScriptedStream {
        async fn next_event(&mut self) -> Result<Option<EventEnvelope>, StreamError> {
            match self.events.pop_front() {
                Some(item) => item,
                // Script exhausted: behave like an idle connection.
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn envelope(seq: i64) -> EventEnvelope {
        EventEnvelope {
            seq,
            channel_id: "c-1".to_string(),
            event: ChatEvent::Unsupported { event_type: "test".to_string() },
        }
    }

    #[tokio::test]
    async fn pump_preserves_arrival_order() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let stream = ScriptedStream::new(
            vec![Ok(Some(envelope(1))), Ok(Some(envelope(2))), Ok(None)],
            close_calls.clone(),
        );

        let mut receiver = spawn_pump(Box::new(stream), CancellationToken::new());

        assert_eq!(receiver.recv().await.map(|env| env.seq), Some(1));
        assert_eq!(receiver.recv().await.map(|env| env.seq), Some(2));
        assert!(receiver.recv().await.is_none(), "orderly end closes the queue");
    }

    #[tokio::test]
    async fn cancellation_closes_the_stream_and_the_queue() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let stream = ScriptedStream::new(vec![], close_calls.clone());
        let cancel = CancellationToken::new();

        let mut receiver = spawn_pump(Box::new(stream), cancel.clone());
        cancel.cancel();

        assert!(receiver.recv().await.is_none(), "cancellation closes the queue");
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_failure_tears_the_pump_down_without_panicking() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let stream = ScriptedStream::new(
            vec![
                Ok(Some(envelope(1))),
                Err(StreamError::Receive("connection reset".to_string())),
            ],
            close_calls.clone(),
        );

        let mut receiver = spawn_pump(Box::new(stream), CancellationToken::new());

        assert_eq!(receiver.recv().await.map(|env| env.seq), Some(1));
        assert!(receiver.recv().await.is_none());

        // The pump closes the connection on its way out.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }
}
