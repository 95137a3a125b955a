//! Typed access to a Pentair IntelliCenter controller
//!
//! This crate provides the controller's JSON message types, the session
//! boundary the bridge supervisor is written against, and a WebSocket
//! implementation of that boundary.
//!
//! # Example
//!
//! ```rust,no_run
//! use intellicenter_api::{Request, UnitConnector, UnitSession, WebSocketConnector};
//! use intellicenter_discovery::Unit;
//!
//! # async fn run(unit: Unit) -> intellicenter_api::Result<()> {
//! let connector = WebSocketConnector::default();
//! let (session, mut events) = connector.connect(&unit).await?;
//!
//! let config = session.request(Request::system_configuration()).await?;
//! println!("{} top-level objects", config.answer.len());
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod message;
pub mod transport;

pub use client::{WebSocketConnector, WebSocketSession};
pub use error::{ApiError, Result};
pub use intellicenter_discovery::Unit;
pub use message::{keys, tags, Message, ObjectEntry, ParamValue, Request};
pub use transport::{TransportEvent, UnitConnector, UnitSession};
