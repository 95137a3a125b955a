//! WebSocket session client.
//!
//! One background task reads frames: responses are routed to the waiting
//! request by `messageID`, `NotifyList` messages become
//! [`TransportEvent::Notify`], and the end of the stream becomes a single
//! [`TransportEvent::Closed`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use intellicenter_discovery::Unit;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{ApiError, Result};
use crate::message::{Message, Request};
use crate::transport::{TransportEvent, UnitConnector, UnitSession};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests waiting for their response
#[derive(Default)]
struct Pending {
    closed: bool,
    waiters: HashMap<String, oneshot::Sender<Message>>,
}

type PendingMap = Arc<Mutex<Pending>>;

/// Opens [`WebSocketSession`]s to `ws://<address>:<port>`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    request_timeout: Duration,
}

impl WebSocketConnector {
    /// `request_timeout` bounds both the handshake and every request
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl UnitConnector for WebSocketConnector {
    type Session = WebSocketSession;

    fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    async fn connect(
        &self,
        unit: &Unit,
    ) -> Result<(WebSocketSession, mpsc::Receiver<TransportEvent>)> {
        let url = unit.ws_url();
        tracing::debug!("opening WebSocket session to {}", url);

        let (socket, _response) = tokio::time::timeout(self.request_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ApiError::ConnectError(format!("handshake with {} timed out", url)))?
            .map_err(|e| ApiError::ConnectError(format!("{}: {}", url, e)))?;

        let (sink, stream) = socket.split();
        let pending: PendingMap = Arc::new(Mutex::new(Pending::default()));
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let reader = tokio::spawn(read_frames(stream, pending.clone(), events_tx));

        let session = WebSocketSession {
            sink: tokio::sync::Mutex::new(sink),
            pending,
            request_timeout: self.request_timeout,
            reader,
        };
        Ok((session, events_rx))
    }
}

/// A live WebSocket session with a controller.
pub struct WebSocketSession {
    sink: tokio::sync::Mutex<SplitSink<Socket, Frame>>,
    pending: PendingMap,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl WebSocketSession {
    async fn write(&self, frame: Frame) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))
    }

    fn forget(&self, message_id: &str) {
        self.pending.lock().waiters.remove(message_id);
    }
}

#[async_trait]
impl UnitSession for WebSocketSession {
    async fn request(&self, request: Request) -> Result<Message> {
        let message_id = request.message_id.clone();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(ApiError::ConnectionClosed);
            }
            pending.waiters.insert(message_id.clone(), tx);
        }

        if let Err(e) = self.send(request).await {
            self.forget(&message_id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(message)) if message.is_success() => Ok(message),
            Ok(Ok(message)) => Err(ApiError::Rejected {
                code: message.response_code().unwrap_or_default(),
                description: message.description.unwrap_or_default(),
            }),
            Ok(Err(_)) => Err(ApiError::ConnectionClosed),
            Err(_) => {
                self.forget(&message_id);
                Err(ApiError::Timeout)
            }
        }
    }

    async fn send(&self, request: Request) -> Result<()> {
        let json = serde_json::to_string(&request)?;
        tracing::trace!("-> {}", json);
        self.write(Frame::Text(json.into())).await
    }

    async fn ping(&self) -> Result<()> {
        self.write(Frame::Ping(Default::default())).await
    }

    async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::debug!("error closing WebSocket session: {}", e);
        }
        self.reader.abort();
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_frames(
    mut stream: SplitStream<Socket>,
    pending: PendingMap,
    events: mpsc::Sender<TransportEvent>,
) {
    while let Some(frame) = stream.next().await {
        let event = match frame {
            Ok(Frame::Text(text)) => route_text(text.as_str(), &pending),
            Ok(Frame::Close(frame)) => {
                tracing::debug!("controller closed the session: {:?}", frame);
                break;
            }
            Ok(_) => None,
            Err(e) => {
                // tungstenite does not recover from read errors
                let _ = events
                    .send(TransportEvent::Error(format!("WebSocket read failed: {}", e)))
                    .await;
                break;
            }
        };

        if let Some(event) = event {
            if events.send(event).await.is_err() {
                // nobody is listening anymore
                break;
            }
        }
    }

    {
        let mut pending = pending.lock();
        pending.closed = true;
        pending.waiters.clear();
    }
    let _ = events.send(TransportEvent::Closed).await;
}

fn route_text(text: &str, pending: &PendingMap) -> Option<TransportEvent> {
    tracing::trace!("<- {}", text);

    let message: Message = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => return Some(TransportEvent::Error(format!("undecodable frame: {}", e))),
    };

    if let Some(id) = message.message_id.as_deref() {
        let waiter = pending.lock().waiters.remove(id);
        if let Some(waiter) = waiter {
            let _ = waiter.send(message);
            return None;
        }
    }

    if message.is_notification() {
        return Some(TransportEvent::Notify(message.object_list));
    }

    tracing::debug!(
        "ignoring unsolicited {} message {:?}",
        message.command,
        message.message_id
    );
    None
}
