//! Controller message types.
//!
//! The controller speaks JSON: every request carries a `messageID` that the
//! response echoes, and unsolicited `NotifyList` messages carry parameter
//! deltas for subscribed objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameter keys used on the wire
pub mod keys {
    pub const OBJTYP: &str = "OBJTYP";
    pub const SUBTYP: &str = "SUBTYP";
    pub const OBJLIST: &str = "OBJLIST";
    pub const SNAME: &str = "SNAME";
    pub const STATUS: &str = "STATUS";
    pub const LOTMP: &str = "LOTMP";
    pub const HTSRC: &str = "HTSRC";
    pub const HTMODE: &str = "HTMODE";
    pub const LSTTMP: &str = "LSTTMP";
    pub const SALT: &str = "SALT";
    pub const PHVAL: &str = "PHVAL";
    pub const PHTNK: &str = "PHTNK";
    pub const ORPVAL: &str = "ORPVAL";
    pub const QUALTY: &str = "QUALTY";
}

/// Object type and subtype tags
pub mod tags {
    pub const BODY: &str = "BODY";
    pub const CIRCUIT: &str = "CIRCUIT";
    pub const POOL: &str = "POOL";
    pub const SPA: &str = "SPA";
    pub const ICHEM: &str = "ICHEM";
    pub const ICHLOR: &str = "ICHLOR";
    pub const FRZ: &str = "FRZ";
}

/// Commands
pub mod commands {
    pub const GET_QUERY: &str = "GetQuery";
    pub const GET_PARAM_LIST: &str = "GetParamList";
    pub const REQUEST_PARAM_LIST: &str = "RequestParamList";
    pub const SET_PARAM_LIST: &str = "SetParamList";
    pub const NOTIFY_LIST: &str = "NotifyList";
}

/// Response code of a successful request
pub const RESPONSE_OK: &str = "200";

/// Wildcard object name for conditional parameter queries
const INCREMENTAL_OBJNAM: &str = "INCR";

/// An outbound request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub command: String,
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub object_list: Vec<RequestObject>,
}

/// One object addressed by a request, with either keys to read or params to write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestObject {
    pub objnam: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl RequestObject {
    fn read(objnam: &str, keys: &[&str]) -> Self {
        Self {
            objnam: objnam.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            params: BTreeMap::new(),
        }
    }

    fn write(objnam: &str, key: &str, value: String) -> Self {
        let mut params = BTreeMap::new();
        params.insert(key.to_string(), value);
        Self {
            objnam: objnam.to_string(),
            keys: Vec::new(),
            params,
        }
    }
}

impl Request {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            message_id: Uuid::new_v4().to_string(),
            query_name: None,
            arguments: None,
            condition: None,
            object_list: Vec::new(),
        }
    }

    /// Full object tree of the controller (bodies and their nested equipment)
    pub fn system_configuration() -> Self {
        Self {
            query_name: Some("GetHardwareDefinition".to_string()),
            arguments: Some(String::new()),
            ..Self::new(commands::GET_QUERY)
        }
    }

    /// Every chemistry object with its type tags and name
    pub fn chemical_status() -> Self {
        Self {
            condition: Some("OBJTYP = CHEM".to_string()),
            object_list: vec![RequestObject::read(
                INCREMENTAL_OBJNAM,
                &[keys::OBJTYP, keys::SUBTYP, keys::SNAME],
            )],
            ..Self::new(commands::GET_PARAM_LIST)
        }
    }

    /// Every circuit with its type tags, name and run status
    pub fn circuit_status() -> Self {
        Self {
            condition: Some("OBJTYP = CIRCUIT".to_string()),
            object_list: vec![RequestObject::read(
                INCREMENTAL_OBJNAM,
                &[keys::OBJTYP, keys::SUBTYP, keys::SNAME, keys::STATUS],
            )],
            ..Self::new(commands::GET_PARAM_LIST)
        }
    }

    /// Subscribe to changes of `keys` on one object
    pub fn subscribe(objnam: &str, keys: &[&str]) -> Self {
        Self {
            object_list: vec![RequestObject::read(objnam, keys)],
            ..Self::new(commands::REQUEST_PARAM_LIST)
        }
    }

    pub fn set_object_status(objnam: &str, on: bool) -> Self {
        let value = if on { "ON" } else { "OFF" };
        Self::set_param(objnam, keys::STATUS, value.to_string())
    }

    pub fn set_setpoint(objnam: &str, degrees: i64) -> Self {
        Self::set_param(objnam, keys::LOTMP, degrees.to_string())
    }

    pub fn set_heat_mode(objnam: &str, on: bool) -> Self {
        let value = if on { "1" } else { "0" };
        Self::set_param(objnam, keys::HTMODE, value.to_string())
    }

    fn set_param(objnam: &str, key: &str, value: String) -> Self {
        Self {
            object_list: vec![RequestObject::write(objnam, key, value)],
            ..Self::new(commands::SET_PARAM_LIST)
        }
    }
}

/// Any inbound message: a response to a request or a notification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub command: String,
    #[serde(rename = "messageID", default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub object_list: Vec<ObjectEntry>,
    #[serde(default)]
    pub answer: Vec<ObjectEntry>,
}

impl Message {
    pub fn is_notification(&self) -> bool {
        self.command == commands::NOTIFY_LIST
    }

    /// Response code as text; some firmware sends it as a number
    pub fn response_code(&self) -> Option<String> {
        match self.response.as_ref()? {
            serde_json::Value::String(code) => Some(code.clone()),
            serde_json::Value::Number(code) => Some(code.to_string()),
            _ => None,
        }
    }

    /// A message without a response code counts as accepted
    pub fn is_success(&self) -> bool {
        self.response_code()
            .map_or(true, |code| code == RESPONSE_OK)
    }
}

/// An addressable object and its parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    #[serde(default)]
    pub objnam: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

/// A parameter value: text for scalar fields, nested objects for `OBJLIST`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Objects(Vec<ObjectEntry>),
    Other(serde_json::Value),
}

impl ObjectEntry {
    pub fn new(objnam: impl Into<String>) -> Self {
        Self {
            objnam: objnam.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style text parameter
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params
            .insert(key.to_string(), ParamValue::Text(value.into()));
        self
    }

    /// Builder-style nested object list
    pub fn with_objects(mut self, key: &str, objects: Vec<ObjectEntry>) -> Self {
        self.params
            .insert(key.to_string(), ParamValue::Objects(objects));
        self
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.params.get(key) {
            Some(ParamValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn objects(&self, key: &str) -> &[ObjectEntry] {
        match self.params.get(key) {
            Some(ParamValue::Objects(objects)) => objects,
            _ => &[],
        }
    }

    /// Whether OBJTYP and SUBTYP match the given tags
    pub fn is_type(&self, objtyp: &str, subtyp: &str) -> bool {
        self.text(keys::OBJTYP) == Some(objtyp) && self.text(keys::SUBTYP) == Some(subtyp)
    }

    pub fn subtype(&self) -> Option<&str> {
        self.text(keys::SUBTYP)
    }
}
