//! Session boundary between the supervisor and a concrete transport.

use std::time::Duration;

use async_trait::async_trait;
use intellicenter_discovery::Unit;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::message::{Message, ObjectEntry, Request};

/// Events a live session reports, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Parameter deltas pushed by the controller
    Notify(Vec<ObjectEntry>),
    /// Something went wrong but the session is still up
    Error(String),
    /// The session ended; no further events follow
    Closed,
}

/// An established session with a controller.
#[async_trait]
pub trait UnitSession: Send + Sync {
    /// Send a request and wait for the response with the same message id
    async fn request(&self, request: Request) -> Result<Message>;

    /// Send a request without waiting for its response
    async fn send(&self, request: Request) -> Result<()>;

    /// Forward a light command; returns `false` when the transport has no
    /// way to express one
    async fn send_light_command(&self, _command: &serde_json::Value) -> Result<bool> {
        Ok(false)
    }

    /// Keep the underlying connection from idling out
    async fn ping(&self) -> Result<()>;

    async fn close(&self);
}

/// Opens sessions. A successful `connect` is the "connected" event.
#[async_trait]
pub trait UnitConnector: Send + Sync {
    type Session: UnitSession + 'static;

    /// Adopt the per-request timeout from the bridge configuration
    fn set_request_timeout(&mut self, _timeout: Duration) {}

    async fn connect(
        &self,
        unit: &Unit,
    ) -> Result<(Self::Session, mpsc::Receiver<TransportEvent>)>;
}
