//! Newline-delimited JSON between the display and the bridge
//!
//! Every line is `{"notification": <name>, "payload": <value>}` in both
//! directions, using the widget's notification names.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::bridge::{BridgeEvent, Intent};
use crate::commands::Command;
use crate::config::BridgeConfig;

pub const CONFIG: &str = "INTELLICENTER_CONFIG";
pub const CIRCUIT: &str = "INTELLICENTER_CIRCUIT";
pub const HEATPOINT: &str = "INTELLICENTER_HEATPOINT";
pub const HEATSTATE: &str = "INTELLICENTER_HEATSTATE";
pub const LIGHTCMD: &str = "INTELLICENTER_LIGHTCMD";
pub const RESULT: &str = "INTELLICENTER_RESULT";
pub const RECONNECTING: &str = "INTELLICENTER_RECONNECTING";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed line: {0}")]
    Malformed(String),

    #[error("unknown notification '{0}'")]
    UnknownNotification(String),

    #[error("invalid {notification} payload: {reason}")]
    InvalidPayload {
        notification: String,
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    notification: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    payload: Value,
}

#[derive(Deserialize)]
struct CircuitPayload {
    id: String,
    #[serde(deserialize_with = "flag")]
    state: bool,
}

#[derive(Deserialize)]
struct HeatpointPayload {
    body: String,
    #[serde(deserialize_with = "degrees")]
    temperature: i64,
}

#[derive(Deserialize)]
struct HeatStatePayload {
    body: String,
    #[serde(deserialize_with = "flag")]
    state: bool,
}

/// `0|1` or `true|false`
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(state) => Ok(state),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "expected 0, 1, true or false, got {}",
            other
        ))),
    }
}

/// Whole degrees, as a number or a numeric string
fn degrees<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let invalid =
        |value: &Value| -> D::Error { serde::de::Error::custom(format!("invalid temperature {}", value)) };
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| invalid(&value)),
        Value::String(text) => text.trim().parse().map_err(|_| invalid(&value)),
        _ => Err(invalid(&value)),
    }
}

fn payload<T>(notification: &str, value: Value) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        notification: notification.to_string(),
        reason: e.to_string(),
    })
}

/// Decode one stdin line. Blank lines decode to `None`.
pub fn decode_intent(line: &str) -> Result<Option<Intent>, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let envelope: Envelope =
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let name = envelope.notification.as_str();

    let intent = match name {
        CONFIG => {
            let config = BridgeConfig::from_value(envelope.payload).map_err(|e| {
                ProtocolError::InvalidPayload {
                    notification: name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            Intent::Configure(config)
        }
        CIRCUIT => {
            let CircuitPayload { id, state } = payload(name, envelope.payload)?;
            Intent::Command(Command::SetCircuit { id, state })
        }
        HEATPOINT => {
            let HeatpointPayload { body, temperature } = payload(name, envelope.payload)?;
            Intent::Command(Command::SetHeatpoint { body, temperature })
        }
        HEATSTATE => {
            let HeatStatePayload { body, state } = payload(name, envelope.payload)?;
            Intent::Command(Command::SetHeatState { body, state })
        }
        LIGHTCMD => Intent::Command(Command::SetLightCommand(envelope.payload)),
        other => return Err(ProtocolError::UnknownNotification(other.to_string())),
    };

    Ok(Some(intent))
}

/// Encode one stdout line, without the trailing newline
pub fn encode_event(event: &BridgeEvent) -> serde_json::Result<String> {
    let envelope = match event {
        BridgeEvent::Result(snapshot) => Envelope {
            notification: RESULT.to_string(),
            payload: serde_json::to_value(snapshot)?,
        },
        BridgeEvent::Reconnecting => Envelope {
            notification: RECONNECTING.to_string(),
            payload: Value::Null,
        },
    };
    serde_json::to_string(&envelope)
}
