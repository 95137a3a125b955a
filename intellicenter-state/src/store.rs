//! Snapshot store
//!
//! The `SnapshotStore` owns the single [`Snapshot`] of the process together
//! with the role mapping of the current session. Notification batches are
//! classified against the role mapping, decoded into field changes and
//! applied in arrival order.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut store = SnapshotStore::new(DecoderOptions::default());
//! store.begin_session(roles);
//!
//! if store.apply(&entries) > 0 {
//!     publish(store.snapshot().clone());
//! }
//! ```

use intellicenter_api::ObjectEntry;

use crate::decoder::{decode_entry, DecoderOptions, FieldChange};
use crate::model::{Body, CircuitState, Role, RoleMap, Snapshot};
use crate::persist::{LastReadings, SideFile};

/// Snapshot plus the session context needed to update it
#[derive(Debug)]
pub struct SnapshotStore {
    snapshot: Snapshot,
    roles: RoleMap,
    options: DecoderOptions,
    side_file: Option<SideFile>,
}

impl SnapshotStore {
    /// Create a zeroed store without persistence
    pub fn new(options: DecoderOptions) -> Self {
        Self {
            snapshot: Snapshot::default(),
            roles: RoleMap::default(),
            options,
            side_file: None,
        }
    }

    /// Create a store whose sticky chemistry readings live in `side_file`.
    ///
    /// The file is read once here; an unreadable file is logged and the
    /// readings start at zero.
    pub fn with_side_file(options: DecoderOptions, side_file: SideFile) -> Self {
        let mut store = Self::new(options);
        match side_file.load() {
            Ok(Some(readings)) => {
                tracing::debug!(
                    "restored last readings from {}: pH {}, ORP {}",
                    side_file.path().display(),
                    readings.last_ph,
                    readings.last_orp
                );
                store.snapshot.last_ph_val = readings.last_ph;
                store.snapshot.last_orp_val = readings.last_orp;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "ignoring unreadable side file {}: {}",
                    side_file.path().display(),
                    e
                );
            }
        }
        store.side_file = Some(side_file);
        store
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn roles(&self) -> &RoleMap {
        &self.roles
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: DecoderOptions) {
        self.options = options;
    }

    /// Install the role mapping resolved for a new session
    pub fn begin_session(&mut self, roles: RoleMap) {
        self.roles = roles;
    }

    /// Forget the role mapping; nothing but tracked circuits classifies until
    /// the next session resolves it again
    pub fn clear_roles(&mut self) {
        self.roles = RoleMap::default();
    }

    /// Make exactly the given `(id, name)` pairs the tracked circuits.
    ///
    /// Circuits that stay tracked keep their last status.
    pub fn track_circuits<I>(&mut self, circuits: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut tracked = std::collections::BTreeMap::new();
        for (id, name) in circuits {
            let status = self
                .snapshot
                .circuits
                .get(&id)
                .map_or(false, |circuit| circuit.status);
            tracked.insert(id, CircuitState { name, status });
        }
        self.snapshot.circuits = tracked;
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.snapshot.circuits.contains_key(id)
    }

    /// Rename a tracked circuit; untracked ids are ignored
    pub fn set_circuit_name(&mut self, id: &str, name: &str) {
        if let Some(circuit) = self.snapshot.circuits.get_mut(id) {
            circuit.name = name.to_string();
        }
    }

    /// Apply a batch of entries in order.
    ///
    /// Returns how many entries referred to a resolved role or tracked
    /// circuit. Entries for any other object never touch the snapshot.
    pub fn apply(&mut self, entries: &[ObjectEntry]) -> usize {
        let mut accepted = 0;
        let mut sticky_changed = false;

        for entry in entries {
            let role = self.roles.classify(&entry.objnam, &self.snapshot.circuits);
            if role == Role::Untracked {
                tracing::debug!("received update for untracked object: {}", entry.objnam);
                continue;
            }
            accepted += 1;

            for change in decode_entry(entry, &role, &self.options) {
                self.apply_change(change);
            }

            if role == Role::Chemistry {
                sticky_changed |= self.refresh_sticky();
            }
        }

        if sticky_changed {
            self.persist();
        }
        accepted
    }

    fn apply_change(&mut self, change: FieldChange) {
        let snapshot = &mut self.snapshot;
        match change {
            FieldChange::Orp(value) => snapshot.orp = value,
            FieldChange::PhVal(value) => snapshot.ph_val = value,
            FieldChange::PhTank(value) => snapshot.ph_tank = value,
            FieldChange::Saturation(value) => snapshot.saturation = value,
            FieldChange::SetPoint(Body::Pool, value) => snapshot.pool_set_point = value,
            FieldChange::SetPoint(Body::Spa, value) => snapshot.spa_set_point = value,
            FieldChange::HeaterStatus(Body::Pool, on) => snapshot.pool_heater_status = on,
            FieldChange::HeaterStatus(Body::Spa, on) => snapshot.spa_heater_status = on,
            FieldChange::BodyStatus(Body::Pool, on) => snapshot.pool_status = on,
            FieldChange::BodyStatus(Body::Spa, on) => snapshot.spa_status = on,
            FieldChange::Temperature(Body::Pool, value) => snapshot.pool_temp = value,
            FieldChange::Temperature(Body::Spa, value) => snapshot.spa_temp = value,
            FieldChange::Salt(value) => snapshot.salt_ppm = value,
            FieldChange::FreezeMode(on) => snapshot.freeze_mode = on,
            FieldChange::CircuitStatus(id, on) => {
                if let Some(circuit) = snapshot.circuits.get_mut(&id) {
                    circuit.status = on;
                }
            }
        }
    }

    /// Copy nonzero current readings into their sticky fields.
    /// Zero never overwrites a sticky value.
    fn refresh_sticky(&mut self) -> bool {
        let snapshot = &mut self.snapshot;
        let mut changed = false;

        if snapshot.ph_val != 0.0 && snapshot.ph_val != snapshot.last_ph_val {
            snapshot.last_ph_val = snapshot.ph_val;
            changed = true;
        }
        if snapshot.orp != 0 && snapshot.orp != snapshot.last_orp_val {
            snapshot.last_orp_val = snapshot.orp;
            changed = true;
        }

        changed
    }

    fn persist(&self) {
        let Some(side_file) = &self.side_file else {
            return;
        };
        let readings = LastReadings {
            last_ph: self.snapshot.last_ph_val,
            last_orp: self.snapshot.last_orp_val,
        };
        if let Err(e) = side_file.save(&readings) {
            tracing::warn!(
                "failed to write last readings to {}: {}",
                side_file.path().display(),
                e
            );
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DecoderOptions::default())
    }
}
