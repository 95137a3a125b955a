//! # IntelliCenter Bridge
//!
//! Keeps one supervised session with a Pentair IntelliCenter pool controller
//! and turns its notifications into a single pool [`Snapshot`] for a display.
//!
//! ```rust,no_run
//! use intellicenter_bridge::{Bridge, BridgeConfig, BridgeEvent, Command};
//! use intellicenter_state::{DecoderOptions, SnapshotStore};
//!
//! # async fn run() -> intellicenter_bridge::Result<()> {
//! let mut bridge = Bridge::with_network(SnapshotStore::new(DecoderOptions::default())).spawn();
//! bridge.configure(BridgeConfig::default()).await?;
//!
//! while let Some(event) = bridge.next_event().await {
//!     match event {
//!         BridgeEvent::Result(snapshot) => println!("pool at {} deg", snapshot.pool_temp),
//!         BridgeEvent::Reconnecting => println!("reconnecting..."),
//!     }
//! }
//!
//! bridge
//!     .command(Command::SetHeatpoint { body: "pool".to_string(), temperature: 84 })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! display ── Intent ──▶ Supervisor ── Request ──▶ UnitSession (WebSocket)
//!    ▲                     │   ▲                         │
//!    └──── BridgeEvent ────┘   └──── TransportEvent ─────┘
//!                          │
//!                    SnapshotStore (roles, parser, side file)
//! ```
//!
//! The supervisor is a single task: notifications, intents and timers are
//! handled one at a time in arrival order.

pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod supervisor;

pub use bridge::{Bridge, BridgeEvent, BridgeHandle, Intent};
pub use commands::{route, Command, Dispatch};
pub use config::{default_state_file, BridgeConfig, ConfigError, Control};
pub use error::{BridgeError, Result};
pub use intellicenter_state::Snapshot;
pub use logging::{init_logging, LoggingMode};
pub use supervisor::SupervisorState;
