//! Model types for intellicenter-state

mod roles;
mod snapshot;

pub use roles::{Body, Role, RoleMap};
pub use snapshot::{CircuitState, Snapshot};
