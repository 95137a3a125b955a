//! Command router
//!
//! Turns display intents into controller requests. Commands are fire and
//! forget: the snapshot only changes once the unit echoes the new state back
//! as a notification.

use intellicenter_api::{ApiError, Request, UnitSession};
use intellicenter_state::{Body, RoleMap};

/// A user action from the display
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetCircuit { id: String, state: bool },
    SetHeatpoint { body: String, temperature: i64 },
    SetHeatState { body: String, state: bool },
    SetLightCommand(serde_json::Value),
}

/// What happened to a command
#[derive(Debug)]
pub enum Dispatch {
    /// No session; nothing was sent
    NoSession,
    /// The command could not be addressed and was dropped
    Dropped(String),
    /// The request went out
    Sent,
    /// The session cannot express this command
    Unsupported,
    /// Sending failed
    Failed(ApiError),
}

/// Route `command` to `session` using the current role mapping.
///
/// Never fails: every outcome is logged and reported as a [`Dispatch`].
pub async fn route<S>(command: &Command, session: Option<&S>, roles: &RoleMap) -> Dispatch
where
    S: UnitSession + ?Sized,
{
    let Some(session) = session else {
        tracing::debug!("no unit connected, ignoring {:?}", command);
        return Dispatch::NoSession;
    };

    let request = match command {
        Command::SetCircuit { id, state } => {
            tracing::info!("setting circuit {} to {}", id, state);
            Request::set_object_status(id, *state)
        }
        Command::SetHeatpoint { body, temperature } => {
            tracing::info!("setting heatpoint for body {} to {} deg", body, temperature);
            match resolve_body(body, roles) {
                Ok(objnam) => Request::set_setpoint(objnam, *temperature),
                Err(reason) => return drop_command(reason),
            }
        }
        Command::SetHeatState { body, state } => {
            tracing::info!("setting heat state for body {} to {}", body, state);
            match resolve_body(body, roles) {
                Ok(objnam) => Request::set_heat_mode(objnam, *state),
                Err(reason) => return drop_command(reason),
            }
        }
        Command::SetLightCommand(value) => {
            tracing::info!("sending light command {}", value);
            return match session.send_light_command(value).await {
                Ok(true) => Dispatch::Sent,
                Ok(false) => {
                    tracing::info!("light commands are not supported by this unit connection");
                    Dispatch::Unsupported
                }
                Err(e) => send_failed(e),
            };
        }
    };

    match session.send(request).await {
        Ok(()) => Dispatch::Sent,
        Err(e) => send_failed(e),
    }
}

fn resolve_body<'a>(tag: &str, roles: &'a RoleMap) -> Result<&'a str, String> {
    let body = Body::parse(tag)
        .ok_or_else(|| format!("invalid body '{}' (valid bodies: pool, spa)", tag))?;
    roles
        .body(body)
        .ok_or_else(|| format!("{} body has not been resolved on this unit", body))
}

fn drop_command(reason: String) -> Dispatch {
    tracing::warn!("dropping command: {}", reason);
    Dispatch::Dropped(reason)
}

fn send_failed(error: ApiError) -> Dispatch {
    tracing::warn!("failed to send command: {}", error);
    Dispatch::Failed(error)
}
