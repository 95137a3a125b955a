//! Public entry point: spawn the supervisor and talk to it over channels

use intellicenter_api::{UnitConnector, WebSocketConnector};
use intellicenter_discovery::{FinderFactory, MdnsFinderFactory};
use intellicenter_state::{Snapshot, SnapshotStore};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::commands::Command;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::supervisor::{Supervisor, SupervisorState};

const INTENT_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something the display asks the bridge to do
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Start (first time) or redeliver the current snapshot (afterwards)
    Configure(BridgeConfig),
    Command(Command),
}

/// Something the bridge tells the display
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The full current snapshot
    Result(Snapshot),
    /// The session was lost and a new attempt is scheduled
    Reconnecting,
}

/// Bridge with its transport, discovery and store chosen but not yet running
pub struct Bridge<C, F> {
    connector: C,
    finders: F,
    store: SnapshotStore,
}

impl Bridge<WebSocketConnector, MdnsFinderFactory> {
    /// WebSocket sessions and mDNS discovery
    pub fn with_network(store: SnapshotStore) -> Self {
        Self::new(WebSocketConnector::default(), MdnsFinderFactory, store)
    }
}

impl<C, F> Bridge<C, F>
where
    C: UnitConnector + 'static,
    F: FinderFactory + 'static,
{
    pub fn new(connector: C, finders: F, store: SnapshotStore) -> Self {
        Self {
            connector,
            finders,
            store,
        }
    }

    /// Start the supervisor on the current tokio runtime.
    ///
    /// The supervisor idles until the first [`Intent::Configure`] and stops
    /// once every intent sender is dropped.
    pub fn spawn(self) -> BridgeHandle {
        let (intents_tx, intents_rx) = mpsc::channel(INTENT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SupervisorState::Idle);

        let supervisor = Supervisor::new(
            self.connector,
            self.finders,
            self.store,
            intents_rx,
            events_tx,
            state_tx,
        );
        let task = tokio::spawn(supervisor.run());

        BridgeHandle {
            intents: intents_tx,
            events: events_rx,
            state: state_rx,
            task,
        }
    }
}

/// Channels into and out of a running bridge
pub struct BridgeHandle {
    pub intents: mpsc::Sender<Intent>,
    pub events: mpsc::Receiver<BridgeEvent>,
    pub state: watch::Receiver<SupervisorState>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    pub async fn configure(&self, config: BridgeConfig) -> Result<()> {
        self.send(Intent::Configure(config)).await
    }

    pub async fn command(&self, command: Command) -> Result<()> {
        self.send(Intent::Command(command)).await
    }

    pub async fn send(&self, intent: Intent) -> Result<()> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }

    pub async fn next_event(&mut self) -> Option<BridgeEvent> {
        self.events.recv().await
    }

    pub fn current_state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Close the intent channel and wait for the supervisor to stop
    pub async fn shutdown(self) {
        let BridgeHandle {
            intents,
            events,
            task,
            ..
        } = self;
        drop(intents);
        // keep draining so a pending emit cannot block the supervisor
        let drain = async move {
            let mut events = events;
            while events.recv().await.is_some() {}
        };
        tokio::select! {
            _ = task => {}
            _ = drain => {}
        }
    }
}
