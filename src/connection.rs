//! 定义了单个共享的物理连接。
//! Defines a single shared physical connection.
//!
//! A `Connection` tracks the lifecycle of the one physical connection to an
//! address and fans its outcome out to every registered client. It never
//! blocks: physical connects and closes run on the driver, and their results
//! come back as [`ConnectionEvent`]s which the owner feeds to
//! [`Connection::handle_event`].

use crate::{
    config::{Config, ConnectOptions, DriverErrorPolicy},
    driver::{DriverEvent, DriverState, PhysicalConnection},
    error::{Error, Result},
    guard::CompletionGuard,
    registry::{Client, ClientRegistry},
};
use std::{collections::VecDeque, fmt, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// The state of a shared connection.
/// 共享连接的状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// No physical connection. Initial state.
    /// 没有物理连接。初始状态。
    #[default]
    Disconnected,
    /// A physical connect has been issued and has not settled yet.
    /// 已发起物理连接，尚未完成。
    Connecting,
    /// The physical connection is established.
    /// 物理连接已建立。
    Connected,
    /// A physical close has been issued.
    /// 已发起物理关闭。
    Disconnecting,
}

/// Completion of a `disconnect` request.
pub(crate) type DisconnectDone = Box<dyn FnOnce(Result<()>) + Send>;

/// Settles a connect attempt for every registered client.
type SettleFn = fn((&mut ClientRegistry, Option<&Error>));

fn settle((clients, error): (&mut ClientRegistry, Option<&Error>)) {
    clients.broadcast_connect_done(error);
}

/// A result from the physical layer, routed back to the owning connection.
///
/// 来自物理层的结果，被路由回所属连接。
#[derive(Debug)]
pub(crate) struct ConnectionEvent {
    pub(crate) address: String,
    pub(crate) kind: ConnectionEventKind,
}

#[derive(Debug)]
pub(crate) enum ConnectionEventKind {
    /// A driver event for the connect attempt with the given id.
    Driver { attempt: u64, event: DriverEvent },
    /// A physical close finished.
    Closed { result: Result<()> },
}

struct ConnectAttempt {
    id: u64,
    guard: CompletionGuard<SettleFn>,
}

/// Represents the single physical connection to one address.
///
/// 代表到一个地址的单个物理连接。
pub(crate) struct Connection<P: PhysicalConnection> {
    address: String,
    state: State,
    clients: ClientRegistry,
    physical: Arc<P>,
    options: ConnectOptions,
    error_policy: DriverErrorPolicy,
    /// The connect attempt whose events are still honored.
    /// 其事件仍然有效的连接尝试。
    attempt: Option<ConnectAttempt>,
    next_attempt_id: u64,
    pending_disconnects: VecDeque<DisconnectDone>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl<P: PhysicalConnection> Connection<P> {
    /// Creates a `Disconnected` connection for `address`.
    ///
    /// Results of physical operations are sent on `events_tx`.
    ///
    /// 为 `address` 创建一个处于 `Disconnected` 状态的连接。
    pub(crate) fn new(
        address: String,
        physical: Arc<P>,
        config: &Config,
        events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            address,
            state: State::Disconnected,
            clients: ClientRegistry::new(),
            physical,
            options: config.connect_options.clone(),
            error_policy: config.driver_error_policy,
            attempt: None,
            next_attempt_id: 0,
            pending_disconnects: VecDeque::new(),
            events_tx,
        }
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn clients_count(&self) -> usize {
        self.clients.len()
    }

    /// Registers `client` and brings it up to date with the connection.
    ///
    /// The client is registered before the state is looked at, so a client
    /// joining an in-flight attempt receives that attempt's outcome.
    ///
    /// 注册 `client` 并使其与连接状态同步。
    pub(crate) fn connect(&mut self, client: Client) {
        let name = client.name.clone();
        self.clients.upsert(client);

        match self.state {
            State::Disconnected => self.start_attempt("connect"),
            State::Connecting => {
                debug!(address = %self.address, client = %name, "Connect already in flight, client will share its outcome");
            }
            State::Connected => {
                debug!(address = %self.address, client = %name, "Already connected, acknowledging client");
                self.clients.notify_connect_done(&name, None);
            }
            State::Disconnecting => {
                let err = Error::Disconnecting {
                    address: self.address.clone(),
                };
                warn!(address = %self.address, client = %name, "Rejecting connect while disconnecting");
                self.clients.notify_connect_done(&name, Some(&err));
            }
        }
    }

    /// Starts tearing down the physical connection.
    ///
    /// `done` runs once the close it issues has completed. Callable from any
    /// state; the driver treats a close of a closed connection as a no-op.
    /// Clients still waiting on an in-flight attempt receive
    /// [`Error::Disconnecting`] as its outcome.
    ///
    /// 开始拆除物理连接。`done` 在本次发起的关闭完成后执行。
    /// 仍在等待进行中连接尝试的客户端会收到 [`Error::Disconnecting`]。
    pub(crate) fn disconnect(&mut self, done: DisconnectDone) {
        self.close_physical(done, "disconnect");
    }

    /// Applies a result from the physical layer.
    ///
    /// 应用来自物理层的结果。
    pub(crate) fn handle_event(&mut self, kind: ConnectionEventKind) {
        match kind {
            ConnectionEventKind::Driver { attempt, event } => {
                self.handle_driver_event(attempt, event)
            }
            ConnectionEventKind::Closed { result } => self.handle_closed(result),
        }
    }

    fn close_physical(&mut self, done: DisconnectDone, op: &'static str) {
        let abandoned = Error::Disconnecting {
            address: self.address.clone(),
        };
        self.settle_attempt(Some(&abandoned));
        if let Some(attempt) = self.attempt.take() {
            debug!(address = %self.address, attempt = attempt.id, op, "Abandoning connect attempt");
        }
        self.set_state(State::Disconnecting, op);
        self.pending_disconnects.push_back(done);

        let physical = self.physical.clone();
        let events_tx = self.events_tx.clone();
        let address = self.address.clone();
        tokio::spawn(async move {
            let result = physical.close().await;
            let _ = events_tx.send(ConnectionEvent {
                address,
                kind: ConnectionEventKind::Closed { result },
            });
        });
    }

    fn start_attempt(&mut self, op: &'static str) {
        self.next_attempt_id += 1;
        let id = self.next_attempt_id;
        self.set_state(State::Connecting, op);
        self.attempt = Some(ConnectAttempt {
            id,
            guard: CompletionGuard::new(settle as SettleFn),
        });

        info!(address = %self.address, attempt = id, "Issuing physical connect");
        let mut events = self.physical.connect(&self.options);

        let events_tx = self.events_tx.clone();
        let address = self.address.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let forwarded = ConnectionEvent {
                    address: address.clone(),
                    kind: ConnectionEventKind::Driver { attempt: id, event },
                };
                if events_tx.send(forwarded).is_err() {
                    break;
                }
            }
            trace!(address = %address, attempt = id, "Driver event stream ended");
        });

        // Some drivers settle synchronously; don't wait a full turn for the event.
        if self.physical.state() == DriverState::Connected {
            debug!(address = %self.address, attempt = id, "Driver probe reports connected");
            self.mark_connected("connect_probe");
        }
    }

    fn handle_driver_event(&mut self, attempt: u64, event: DriverEvent) {
        let current = self.attempt.as_ref().map(|a| a.id) == Some(attempt);

        match event {
            DriverEvent::Connected if current => self.mark_connected("driver_connected"),
            DriverEvent::Connected => {
                debug!(address = %self.address, attempt, "Ignoring connected signal from a stale connect attempt");
            }
            DriverEvent::Error(err) => {
                warn!(address = %self.address, attempt, state = ?self.state, error = %err, "Driver error");
                self.clients.broadcast_error(&err);
                if current
                    && self.state == State::Connecting
                    && self.error_policy == DriverErrorPolicy::FailFast
                {
                    self.settle_attempt(Some(&err));
                    // Close the handle so the driver cannot finish the failed attempt.
                    self.close_physical(Box::new(|_: Result<()>| {}), "driver_error");
                }
            }
            DriverEvent::Disconnected => {
                info!(address = %self.address, state = ?self.state, "Driver reported disconnected");
            }
        }
    }

    fn mark_connected(&mut self, op: &'static str) {
        if self.state != State::Connecting {
            trace!(address = %self.address, state = ?self.state, op, "Connected signal has no effect");
            return;
        }
        self.set_state(State::Connected, op);
        self.settle_attempt(None);
    }

    fn settle_attempt(&mut self, error: Option<&Error>) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        if !attempt.guard.fire((&mut self.clients, error)) {
            trace!(address = %self.address, attempt = attempt.id, "Connect attempt already settled");
        }
    }

    fn handle_closed(&mut self, result: Result<()>) {
        if let Err(err) = &result {
            warn!(address = %self.address, error = %err, "Physical close failed");
        }
        let done = self.pending_disconnects.pop_front();
        if self.pending_disconnects.is_empty() && self.state == State::Disconnecting {
            self.set_state(State::Disconnected, "close_done");
        }
        match done {
            Some(done) => done(result),
            None => warn!(address = %self.address, "Close completed with no pending disconnect"),
        }
    }

    fn set_state(&mut self, state: State, op: &'static str) {
        if self.state != state {
            debug!(address = %self.address, op, from = ?self.state, to = ?state, "Connection state transition");
            self.state = state;
        }
    }
}

impl<P: PhysicalConnection> fmt::Debug for Connection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("clients", &self.clients.len())
            .field("pending_disconnects", &self.pending_disconnects.len())
            .finish()
    }
}
