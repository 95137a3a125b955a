//! Pool state for intellicenter-bridge
//!
//! This crate keeps the one [`Snapshot`] the display renders. Controller
//! notifications are classified by the session's [`RoleMap`], decoded into
//! typed [`FieldChange`]s and applied by the [`SnapshotStore`]. The last
//! nonzero pH and ORP readings can be kept in a [`SideFile`] across restarts.
//!
//! ## Example
//!
//! ```rust
//! use intellicenter_api::{keys, ObjectEntry};
//! use intellicenter_state::{DecoderOptions, RoleMap, SnapshotStore};
//!
//! let mut store = SnapshotStore::new(DecoderOptions::default());
//! store.begin_session(RoleMap {
//!     pool: Some("B1101".to_string()),
//!     ..Default::default()
//! });
//!
//! let accepted = store.apply(&[ObjectEntry::new("B1101").with(keys::LSTTMP, "81")]);
//! assert_eq!(accepted, 1);
//! assert_eq!(store.snapshot().pool_temp, 81);
//! ```

pub mod decoder;
pub mod error;
pub mod model;
pub mod persist;
pub mod store;

pub use decoder::{decode_entry, DecoderOptions, FieldChange, DEFAULT_HEATER_OFF_VALUE};
pub use error::{Result, StateError};
pub use model::{Body, CircuitState, Role, RoleMap, Snapshot};
pub use persist::{LastReadings, SideFile};
pub use store::SnapshotStore;
