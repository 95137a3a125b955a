//! Object-name to role mapping for one session

use std::collections::BTreeMap;
use std::fmt;

use super::CircuitState;

/// A circulation zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Body {
    Pool,
    Spa,
}

impl Body {
    /// Parse a body tag; anything but `pool`/`spa` (any case) is rejected
    pub fn parse(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("pool") {
            Some(Body::Pool)
        } else if tag.eq_ignore_ascii_case("spa") {
            Some(Body::Spa)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Body::Pool => "pool",
            Body::Spa => "spa",
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an inbound object name refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Chemistry,
    Body(Body),
    Chlorinator,
    Freeze,
    Circuit,
    Untracked,
}

/// Object names resolved during configuration discovery.
///
/// Rebuilt from scratch on every session; never carried across reconnects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap {
    pub pool: Option<String>,
    pub spa: Option<String>,
    pub chemistry: Option<String>,
    pub chlorinator: Option<String>,
    pub freeze: Option<String>,
}

impl RoleMap {
    pub fn body(&self, body: Body) -> Option<&str> {
        match body {
            Body::Pool => self.pool.as_deref(),
            Body::Spa => self.spa.as_deref(),
        }
    }

    /// Classify `objnam`; the first matching role wins
    pub fn classify(&self, objnam: &str, circuits: &BTreeMap<String, CircuitState>) -> Role {
        let is = |slot: &Option<String>| slot.as_deref() == Some(objnam);

        if is(&self.chemistry) {
            Role::Chemistry
        } else if is(&self.pool) {
            Role::Body(Body::Pool)
        } else if is(&self.spa) {
            Role::Body(Body::Spa)
        } else if is(&self.chlorinator) {
            Role::Chlorinator
        } else if is(&self.freeze) {
            Role::Freeze
        } else if circuits.contains_key(objnam) {
            Role::Circuit
        } else {
            Role::Untracked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> RoleMap {
        RoleMap {
            pool: Some("B1101".to_string()),
            spa: Some("B1202".to_string()),
            chemistry: Some("CHM01".to_string()),
            chlorinator: Some("CHR01".to_string()),
            freeze: Some("X0044".to_string()),
        }
    }

    #[test]
    fn test_body_parse() {
        assert_eq!(Body::parse("pool"), Some(Body::Pool));
        assert_eq!(Body::parse("Spa"), Some(Body::Spa));
        assert_eq!(Body::parse("lagoon"), None);
        assert_eq!(Body::parse(""), None);
    }

    #[test]
    fn test_classify() {
        let mut circuits = BTreeMap::new();
        circuits.insert("C0001".to_string(), CircuitState::default());
        let roles = roles();

        assert_eq!(roles.classify("CHM01", &circuits), Role::Chemistry);
        assert_eq!(roles.classify("B1101", &circuits), Role::Body(Body::Pool));
        assert_eq!(roles.classify("B1202", &circuits), Role::Body(Body::Spa));
        assert_eq!(roles.classify("CHR01", &circuits), Role::Chlorinator);
        assert_eq!(roles.classify("X0044", &circuits), Role::Freeze);
        assert_eq!(roles.classify("C0001", &circuits), Role::Circuit);
        assert_eq!(roles.classify("C0002", &circuits), Role::Untracked);
    }

    #[test]
    fn test_role_beats_tracked_circuit() {
        let mut circuits = BTreeMap::new();
        circuits.insert("X0044".to_string(), CircuitState::default());
        assert_eq!(roles().classify("X0044", &circuits), Role::Freeze);
    }

    #[test]
    fn test_unresolved_roles_match_nothing() {
        let roles = RoleMap::default();
        assert_eq!(roles.classify("", &BTreeMap::new()), Role::Untracked);
        assert_eq!(roles.body(Body::Pool), None);
    }
}
