//! Bridge configuration
//!
//! The display sends its whole module configuration as the payload of the
//! `configure` intent. Only the fields below matter to the bridge; display
//! options riding along in the same object are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use intellicenter_discovery::DEFAULT_UNIT_PORT;
use intellicenter_state::{Body, DecoderOptions, DEFAULT_HEATER_OFF_VALUE};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const DEFAULT_RECONNECT_DELAY_SECS: u64 = 10;
const DEFAULT_DISCOVERY_RETRY_SECS: u64 = 5;
const DEFAULT_KEEPALIVE_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Longest accepted timer, one week
pub const MAX_TIMER_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Timers out of range or controls that can never work; every problem is listed
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The payload is not a valid configuration object
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// A control the display shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Control {
    /// Toggle for one circuit
    Circuit {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
    /// Setpoint up/down for a body
    Heatpoint {
        #[serde(default)]
        body: String,
        #[serde(default)]
        name: String,
    },
    /// Heater on/off for a body
    Heatmode {
        #[serde(default)]
        body: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        mode: Option<serde_json::Value>,
    },
}

impl Control {
    /// Why this control can never work, if it can't
    fn problem(&self) -> Option<String> {
        match self {
            Control::Circuit { id, .. } if id.trim().is_empty() => {
                Some("circuit control without an id".to_string())
            }
            Control::Heatpoint { body, .. } | Control::Heatmode { body, .. }
                if Body::parse(body).is_none() =>
            {
                Some(format!(
                    "invalid body '{}' for {} control (valid bodies: pool, spa)",
                    body,
                    self.kind()
                ))
            }
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Control::Circuit { .. } => "circuit",
            Control::Heatpoint { .. } => "heatpoint",
            Control::Heatmode { .. } => "heatmode",
        }
    }
}

/// Everything the supervisor needs to know about the unit and the display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Direct-dial host or IP; empty means discovery
    pub server_address: String,
    /// Direct-dial port; 0 means discovery
    #[serde(deserialize_with = "deserialize_port")]
    pub server_port: u16,
    /// IPv4 address of the interface used for discovery; empty means all
    pub multicast_interface: String,
    pub controls: Vec<Control>,
    pub reconnect_delay_secs: u64,
    pub discovery_retry_secs: u64,
    /// 0 disables the keep-alive ping
    pub keepalive_secs: u64,
    pub request_timeout_secs: u64,
    /// Heat-source value the unit reports while no heater runs
    pub heater_off_value: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            server_port: DEFAULT_UNIT_PORT,
            multicast_interface: String::new(),
            controls: Vec::new(),
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            discovery_retry_secs: DEFAULT_DISCOVERY_RETRY_SECS,
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            heater_off_value: DEFAULT_HEATER_OFF_VALUE.to_string(),
        }
    }
}

/// Ports arrive as numbers or as strings from hand-written configs
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) if text.trim().is_empty() => Ok(0),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Check timers and controls, reporting every problem at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        for (name, secs) in [
            ("reconnectDelaySecs", self.reconnect_delay_secs),
            ("discoveryRetrySecs", self.discovery_retry_secs),
            ("requestTimeoutSecs", self.request_timeout_secs),
        ] {
            if secs == 0 {
                problems.push(format!("{} must be greater than zero", name));
            }
        }
        for (name, secs) in [
            ("reconnectDelaySecs", self.reconnect_delay_secs),
            ("discoveryRetrySecs", self.discovery_retry_secs),
            ("keepaliveSecs", self.keepalive_secs),
            ("requestTimeoutSecs", self.request_timeout_secs),
        ] {
            if secs > MAX_TIMER_SECS {
                problems.push(format!("{} must be at most {}", name, MAX_TIMER_SECS));
            }
        }

        problems.extend(self.controls.iter().enumerate().filter_map(|(index, control)| {
            control
                .problem()
                .map(|problem| format!("controls[{}]: {}", index, problem))
        }));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Copy with invalid controls dropped, zero timers reset to defaults and
    /// long timers capped at [`MAX_TIMER_SECS`]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let positive = |secs: u64, default: u64| match secs {
            0 => default,
            secs => secs.min(MAX_TIMER_SECS),
        };

        Self {
            controls: self
                .controls
                .iter()
                .filter(|control| control.problem().is_none())
                .cloned()
                .collect(),
            reconnect_delay_secs: positive(self.reconnect_delay_secs, defaults.reconnect_delay_secs),
            discovery_retry_secs: positive(self.discovery_retry_secs, defaults.discovery_retry_secs),
            request_timeout_secs: positive(self.request_timeout_secs, defaults.request_timeout_secs),
            keepalive_secs: self.keepalive_secs.min(MAX_TIMER_SECS),
            ..self.clone()
        }
    }

    /// Address and port to dial when both are set
    pub fn direct_target(&self) -> Option<(&str, u16)> {
        let address = self.server_address.trim();
        if address.is_empty() || self.server_port == 0 {
            None
        } else {
            Some((address, self.server_port))
        }
    }

    /// `(id, display name)` of every circuit control
    pub fn tracked_circuits(&self) -> Vec<(String, String)> {
        self.controls
            .iter()
            .filter_map(|control| match control {
                Control::Circuit { id, name } if !id.trim().is_empty() => Some((
                    id.clone(),
                    name.clone().unwrap_or_else(|| id.clone()),
                )),
                _ => None,
            })
            .collect()
    }

    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            heater_off_value: self.heater_off_value.clone(),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn discovery_retry(&self) -> Duration {
        Duration::from_secs(self.discovery_retry_secs)
    }

    pub fn keepalive(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Default location of the last-readings side file
pub fn default_state_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("intellicenter-bridge")
        .join("last-readings.json")
}
