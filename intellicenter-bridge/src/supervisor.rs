//! Session supervisor
//!
//! Owns the lifecycle of the one connection to the unit:
//!
//! ```text
//! IDLE → DISCOVERING → CONNECTING → CONFIGURING → SUBSCRIBED
//!   ↑         (or direct dial)                        │ close
//!   └──────────────── RECONNECT_WAIT ←─ CLOSED ←───────┘
//! ```
//!
//! Everything runs on one task. Timers live inside the state that needs
//! them and are dropped when that state is left, so nothing fires across a
//! reconnect.

use std::io;
use std::time::Duration;

use intellicenter_api::{TransportEvent, Unit, UnitConnector, UnitSession};
use intellicenter_discovery::{deadline_after, parse_interface, search_until_found, FinderFactory};
use intellicenter_state::SnapshotStore;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Interval};

use crate::bridge::{BridgeEvent, Intent};
use crate::commands;
use crate::config::BridgeConfig;
use crate::session;

/// Where the supervisor is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Discovering,
    Connecting,
    Configuring,
    Subscribed,
    Closed,
    ReconnectWait,
    Stopped,
}

enum Outcome {
    /// Tear down and try again after the reconnect delay
    Retry { notify: bool },
    Shutdown,
}

enum Located {
    Unit(Unit),
    Retry,
    Shutdown,
}

/// State shared by every phase of the supervisor
struct Context {
    store: SnapshotStore,
    config: BridgeConfig,
    intents: mpsc::Receiver<Intent>,
    events: mpsc::Sender<BridgeEvent>,
    state: watch::Sender<SupervisorState>,
    /// At least one snapshot went out
    delivered: bool,
}

impl Context {
    fn set_state(&self, state: SupervisorState) {
        self.state.send_replace(state);
    }

    async fn emit(&self, event: BridgeEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    async fn publish(&self) {
        self.emit(BridgeEvent::Result(self.store.snapshot().clone()))
            .await;
    }

    /// Handle an intent while no session is established.
    /// Returns `false` once the intent channel is closed.
    async fn handle_offline(&mut self, intent: Option<Intent>) -> bool {
        match intent {
            None => false,
            Some(Intent::Configure(_)) => {
                // still loading; the first snapshot follows the initial setup
                if self.delivered {
                    self.publish().await;
                }
                true
            }
            Some(Intent::Command(command)) => {
                commands::route(&command, None::<&dyn UnitSession>, self.store.roles()).await;
                true
            }
        }
    }
}

pub(crate) struct Supervisor<C, F> {
    connector: C,
    finders: F,
    ctx: Context,
}

impl<C, F> Supervisor<C, F>
where
    C: UnitConnector,
    F: FinderFactory,
{
    pub(crate) fn new(
        connector: C,
        finders: F,
        store: SnapshotStore,
        intents: mpsc::Receiver<Intent>,
        events: mpsc::Sender<BridgeEvent>,
        state: watch::Sender<SupervisorState>,
    ) -> Self {
        Self {
            connector,
            finders,
            ctx: Context {
                store,
                config: BridgeConfig::default(),
                intents,
                events,
                state,
                delivered: false,
            },
        }
    }

    pub(crate) async fn run(mut self) {
        self.ctx.set_state(SupervisorState::Idle);

        // nothing happens until the display sends its configuration
        loop {
            match self.ctx.intents.recv().await {
                Some(Intent::Configure(config)) => {
                    self.adopt_config(config);
                    break;
                }
                intent => {
                    if !self.ctx.handle_offline(intent).await {
                        self.ctx.set_state(SupervisorState::Stopped);
                        return;
                    }
                }
            }
        }

        loop {
            let outcome = self.run_session().await;
            // roles are rediscovered on every session
            self.ctx.store.clear_roles();

            match outcome {
                Outcome::Shutdown => break,
                Outcome::Retry { notify } => {
                    if notify {
                        self.ctx.emit(BridgeEvent::Reconnecting).await;
                    }
                    if !self.wait_reconnect().await {
                        break;
                    }
                }
            }
        }

        self.ctx.set_state(SupervisorState::Stopped);
    }

    fn adopt_config(&mut self, config: BridgeConfig) {
        if let Err(e) = config.validate() {
            tracing::warn!("{}; dropping invalid controls and resetting out-of-range timers", e);
        }
        let config = config.sanitized();

        self.ctx.store.set_options(config.decoder_options());
        self.ctx.store.track_circuits(config.tracked_circuits());
        self.connector.set_request_timeout(config.request_timeout());
        self.ctx.config = config;
    }

    async fn run_session(&mut self) -> Outcome {
        self.ctx.set_state(SupervisorState::Idle);
        let retry_secs = self.ctx.config.reconnect_delay_secs;

        let unit = match self.locate_unit().await {
            Located::Unit(unit) => unit,
            Located::Retry => return Outcome::Retry { notify: false },
            Located::Shutdown => return Outcome::Shutdown,
        };

        self.ctx.set_state(SupervisorState::Connecting);
        tracing::info!("initial connection to unit at {}:{}...", unit.address, unit.port);
        let connected = {
            let connect = self.connector.connect(&unit);
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    result = &mut connect => break result,
                    intent = self.ctx.intents.recv() => {
                        if !self.ctx.handle_offline(intent).await {
                            return Outcome::Shutdown;
                        }
                    }
                }
            }
        };

        let (session, mut transport) = match connected {
            Ok(connected) => connected,
            Err(e) => {
                tracing::error!(
                    "failed to connect to unit: {}. retrying in {} seconds",
                    e,
                    retry_secs
                );
                return Outcome::Retry { notify: true };
            }
        };

        self.ctx.set_state(SupervisorState::Configuring);
        if let Err(e) = session::discover_configuration(&session, &mut self.ctx.store).await {
            tracing::error!(
                "error in unit configuration: {}. restarting the connection process in {} seconds",
                e,
                retry_secs
            );
            session.close().await;
            return Outcome::Retry { notify: true };
        }

        self.ctx.set_state(SupervisorState::Subscribed);
        self.ctx.delivered = true;
        self.ctx.publish().await;

        let outcome = self.supervise(&session, &mut transport).await;
        session.close().await;
        outcome
    }

    /// Direct dial when configured and resolvable, discovery otherwise
    async fn locate_unit(&mut self) -> Located {
        if let Some((address, port)) = self.ctx.config.direct_target() {
            tracing::info!("connecting directly to configured unit at {}:{}", address, port);
            match resolve_direct(address, port).await {
                Ok(unit) => return Located::Unit(unit),
                Err(e) => tracing::warn!(
                    "unable to resolve configured unit {}: {}. searching the network instead",
                    address,
                    e
                ),
            }
        }

        self.ctx.set_state(SupervisorState::Discovering);
        tracing::info!("starting search for local units");

        let interface = match parse_interface(&self.ctx.config.multicast_interface) {
            Ok(interface) => interface,
            Err(e) => {
                tracing::warn!("{}; searching on all interfaces", e);
                None
            }
        };
        let retry_secs = self.ctx.config.reconnect_delay_secs;
        let mut finder = match self.finders.open(interface) {
            Ok(finder) => finder,
            Err(e) => {
                tracing::error!(
                    "error trying to find a server: {}. scheduling a retry in {} seconds",
                    e,
                    retry_secs
                );
                return Located::Retry;
            }
        };

        let search = search_until_found(&mut finder, self.ctx.config.discovery_retry());
        tokio::pin!(search);
        loop {
            tokio::select! {
                result = &mut search => {
                    return match result {
                        Ok(unit) => {
                            tracing::info!("local unit found at {}:{}", unit.address, unit.port);
                            Located::Unit(unit)
                        }
                        Err(e) => {
                            tracing::error!(
                                "error trying to find a server: {}. scheduling a retry in {} seconds",
                                e,
                                retry_secs
                            );
                            Located::Retry
                        }
                    };
                }
                intent = self.ctx.intents.recv() => {
                    if !self.ctx.handle_offline(intent).await {
                        return Located::Shutdown;
                    }
                }
            }
        }
    }

    /// Steady state: route notifications, intents and keep-alives until the
    /// session ends
    async fn supervise(
        &mut self,
        session: &C::Session,
        transport: &mut mpsc::Receiver<TransportEvent>,
    ) -> Outcome {
        let mut keepalive = self
            .ctx
            .config
            .keepalive()
            .map(|period| interval_at(deadline_after(period), period));

        loop {
            tokio::select! {
                event = transport.recv() => match event {
                    Some(TransportEvent::Notify(entries)) => {
                        if self.ctx.store.apply(&entries) > 0 {
                            self.ctx.publish().await;
                        }
                    }
                    Some(TransportEvent::Error(message)) => {
                        tracing::warn!("error in unit connection: {}", message);
                    }
                    Some(TransportEvent::Closed) | None => {
                        tracing::error!(
                            "unit connection closed unexpectedly. restarting the connection process in {} seconds",
                            self.ctx.config.reconnect_delay_secs
                        );
                        self.ctx.set_state(SupervisorState::Closed);
                        return Outcome::Retry { notify: true };
                    }
                },
                intent = self.ctx.intents.recv() => match intent {
                    None => return Outcome::Shutdown,
                    Some(Intent::Configure(_)) => self.ctx.publish().await,
                    Some(Intent::Command(command)) => {
                        commands::route(&command, Some(session), self.ctx.store.roles()).await;
                    }
                },
                _ = keepalive_tick(&mut keepalive) => {
                    if let Err(e) = session.ping().await {
                        tracing::warn!("keep-alive ping failed: {}", e);
                    }
                }
            }
        }
    }

    /// Sleep out the reconnect delay; `false` when shut down meanwhile
    async fn wait_reconnect(&mut self) -> bool {
        self.ctx.set_state(SupervisorState::ReconnectWait);
        let delay = tokio::time::sleep_until(deadline_after(self.ctx.config.reconnect_delay()));
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                intent = self.ctx.intents.recv() => {
                    if !self.ctx.handle_offline(intent).await {
                        return false;
                    }
                }
            }
        }
    }
}

async fn keepalive_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn resolve_direct(address: &str, port: u16) -> io::Result<Unit> {
    let resolved = tokio::time::timeout(
        Duration::from_secs(10),
        tokio::net::lookup_host((address, port)),
    )
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "name resolution timed out"))??
    .next()
    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "name resolved to no addresses"))?;

    Ok(Unit {
        name: address.to_string(),
        address: resolved.ip(),
        port,
    })
}
