//! tests/common/harness.rs
use async_trait::async_trait;
use shared_connections::{
    ClientCallbacks, ClientEvents, ConnectOptions, Driver, DriverEvent, DriverEvents, DriverState,
    Error, PhysicalConnection, Result, SharedConnections, State,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::format::FmtSpan;

pub const MONGO_PATH: &str = "localhost:17016/test";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "shared_connections=debug,lifecycle=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::FULL)
            .with_test_writer()
            .init();
    });
}

/// A scripted reaction of the mock driver.
#[derive(Debug, Clone)]
pub enum Action {
    /// Emit this event as soon as a connect is issued.
    Emit(DriverEvent),
    /// Fail the next close with this message.
    FailClose(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    actions: VecDeque<Action>,
    connect_called: usize,
    disconnect_called: usize,
    connected_path: Option<String>,
    state: Option<DriverState>,
    events_tx: Option<mpsc::UnboundedSender<DriverEvent>>,
}

/// A physical connection that follows a script shared by every handle of
/// its driver.
#[derive(Debug, Clone)]
pub struct ScriptedConnection {
    path: String,
    report_state: bool,
    script: Arc<Mutex<ScriptState>>,
}

#[async_trait]
impl PhysicalConnection for ScriptedConnection {
    fn connect(&self, _options: &ConnectOptions) -> DriverEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut script = self.script.lock().unwrap();
        script.connect_called += 1;
        if script
            .connected_path
            .as_deref()
            .is_some_and(|path| path != self.path)
        {
            let _ = tx.send(DriverEvent::Error(Error::driver(
                "scripted driver only supports one connection",
            )));
            return rx;
        }
        script.connected_path = Some(self.path.clone());
        if self.report_state {
            script.state = Some(DriverState::Connected);
        }
        if let Some(Action::Emit(event)) = script.actions.front().cloned() {
            script.actions.pop_front();
            let _ = tx.send(event);
        }
        script.events_tx = Some(tx);
        rx
    }

    async fn close(&self) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        if script.connected_path.is_some() {
            script.disconnect_called += 1;
            script.state = Some(DriverState::Disconnected);
            script.connected_path = None;
        }
        if let Some(Action::FailClose(message)) = script.actions.front().cloned() {
            script.actions.pop_front();
            return Err(Error::driver(message));
        }
        Ok(())
    }

    fn state(&self) -> DriverState {
        if !self.report_state {
            return DriverState::Unknown;
        }
        self.script
            .lock()
            .unwrap()
            .state
            .unwrap_or(DriverState::Disconnected)
    }
}

/// A driver whose handles all share one script.
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    report_state: bool,
    script: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    /// A driver that exposes a synchronous state probe.
    pub fn with_probe(actions: Vec<Action>) -> Self {
        Self::new(actions, true)
    }

    /// A driver that only reports through events.
    pub fn without_probe(actions: Vec<Action>) -> Self {
        Self::new(actions, false)
    }

    fn new(actions: Vec<Action>, report_state: bool) -> Self {
        let script = ScriptState {
            actions: actions.into(),
            ..ScriptState::default()
        };
        Self {
            report_state,
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn connect_called(&self) -> usize {
        self.script.lock().unwrap().connect_called
    }

    pub fn disconnect_called(&self) -> usize {
        self.script.lock().unwrap().disconnect_called
    }

    /// Emits an event on the latest connect attempt.
    pub fn emit(&self, event: DriverEvent) {
        let script = self.script.lock().unwrap();
        if let Some(tx) = &script.events_tx {
            let _ = tx.send(event);
        }
    }
}

impl Driver for ScriptedDriver {
    type Connection = ScriptedConnection;

    fn open(&self, address: &str) -> Result<ScriptedConnection> {
        Ok(ScriptedConnection {
            path: address.to_string(),
            report_state: self.report_state,
            script: self.script.clone(),
        })
    }
}

/// Connects `name` to [`MONGO_PATH`] and returns its event stream.
pub async fn connect_client(shared: &SharedConnections, name: &str) -> ClientEvents {
    let (callbacks, events) = ClientCallbacks::channel();
    shared.connect(name, MONGO_PATH, callbacks).await.unwrap();
    events
}

/// Waits for the next connect outcome of a client, with a timeout.
pub async fn connect_done(events: &mut ClientEvents) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), events.connect_done())
        .await
        .expect("timed out waiting for connect outcome")
}

/// Polls the directory until the connection to [`MONGO_PATH`] is in `expected`.
pub async fn wait_for_state(shared: &SharedConnections, expected: State) {
    for _ in 0..100 {
        if shared.state(MONGO_PATH).await.unwrap() == Some(expected) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("connection never reached {expected:?}");
}
