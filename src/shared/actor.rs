//! The task that owns the directory of shared connections.
//!
//! 拥有共享连接目录的任务实现。

use super::command::DirectoryCommand;
use crate::{
    config::Config,
    connection::{Connection, ConnectionEvent, DisconnectDone},
    driver::Driver,
    error::{Error, Result},
    guard::CompletionGuard,
    registry::{Client, ClientCallbacks},
};
use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A connection finished the disconnect issued for a barrier.
#[derive(Debug)]
pub(crate) struct BarrierArrival {
    barrier: u64,
    result: Result<()>,
}

/// Counts disconnect completions across every connection of one
/// `disconnect_all` call.
///
/// Releases on the last successful completion or on the first error,
/// whichever comes first, and only once.
///
/// 统计一次 `disconnect_all` 中所有连接的断开完成情况。
/// 在最后一个成功完成或第一个错误时释放（以先到者为准），且只释放一次。
pub(crate) struct DisconnectBarrier {
    remaining: usize,
    done: CompletionGuard<DisconnectDone>,
}

impl DisconnectBarrier {
    pub(crate) fn new(count: usize, done: DisconnectDone) -> Self {
        Self {
            remaining: count,
            done: CompletionGuard::new(done),
        }
    }

    pub(crate) fn arrive(&mut self, result: Result<()>) {
        self.remaining = self.remaining.saturating_sub(1);
        match result {
            Err(err) => {
                if self.done.fire(Err(err)) {
                    debug!(remaining = self.remaining, "Disconnect barrier released by an error");
                }
            }
            Ok(()) if self.remaining == 0 => {
                self.done.fire(Ok(()));
            }
            Ok(()) => {}
        }
    }

    /// Every connection has reported back.
    pub(crate) fn is_drained(&self) -> bool {
        self.remaining == 0
    }
}

/// The actor that owns every `Connection` in the directory.
///
/// All state transitions and client callbacks run on this task, so a
/// connection's state and registry are never touched concurrently.
///
/// 拥有目录中每个 `Connection` 的 actor。
/// 所有状态转换和客户端回调都在此任务上执行，因此连接的状态和注册表不会被并发访问。
pub(crate) struct DirectoryActor<D: Driver> {
    driver: D,
    config: Config,
    connections: HashMap<String, Connection<D::Connection>>,
    barriers: HashMap<u64, DisconnectBarrier>,
    next_barrier_id: u64,
    command_rx: mpsc::Receiver<DirectoryCommand>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    arrivals_tx: mpsc::UnboundedSender<BarrierArrival>,
    arrivals_rx: mpsc::UnboundedReceiver<BarrierArrival>,
}

impl<D: Driver> DirectoryActor<D> {
    pub(crate) fn new(
        driver: D,
        config: Config,
        command_rx: mpsc::Receiver<DirectoryCommand>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (arrivals_tx, arrivals_rx) = mpsc::unbounded_channel();
        Self {
            driver,
            config,
            connections: HashMap::new(),
            barriers: HashMap::new(),
            next_barrier_id: 0,
            command_rx,
            events_tx,
            events_rx,
            arrivals_tx,
            arrivals_rx,
        }
    }

    /// Runs the actor's main event loop.
    ///
    /// 运行 actor 的主事件循环。
    pub(crate) async fn run(&mut self) {
        loop {
            tokio::select! {
                // 1. Handle commands from the public handles.
                // 1. 处理来自公共句柄的命令。
                command = self.command_rx.recv() => {
                    match command {
                        Some(DirectoryCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command),
                    }
                }
                // 2. Handle results from the physical layer.
                // 2. 处理来自物理层的结果。
                Some(event) = self.events_rx.recv() => {
                    self.handle_connection_event(event);
                }
                // 3. Handle disconnect completions for pending barriers.
                // 3. 处理待定屏障的断开完成。
                Some(arrival) = self.arrivals_rx.recv() => {
                    self.handle_arrival(arrival);
                }
            }
        }
        info!(
            connections = self.connections.len(),
            "Shared connection directory stopped"
        );
    }

    fn handle_command(&mut self, command: DirectoryCommand) {
        match command {
            DirectoryCommand::Connect {
                client_name,
                address,
                callbacks,
                response_tx,
            } => {
                let result = self.handle_connect(client_name, address, callbacks);
                let _ = response_tx.send(result);
            }
            DirectoryCommand::DisconnectAll { response_tx } => {
                self.handle_disconnect_all(Box::new(move |result: Result<()>| {
                    let _ = response_tx.send(result);
                }));
            }
            DirectoryCommand::ClientsCount {
                address,
                response_tx,
            } => {
                let count = self
                    .connections
                    .get(&address)
                    .map_or(0, |c| c.clients_count());
                let _ = response_tx.send(count);
            }
            DirectoryCommand::State {
                address,
                response_tx,
            } => {
                let _ = response_tx.send(self.connections.get(&address).map(|c| c.state()));
            }
            DirectoryCommand::Shutdown => {}
        }
    }

    fn handle_connect(
        &mut self,
        client_name: String,
        address: String,
        callbacks: ClientCallbacks,
    ) -> Result<()> {
        // Only one address can be shared per directory.
        if let Some(existing) = self.connections.keys().find(|existing| **existing != address) {
            warn!(existing = %existing, requested = %address, client = %client_name, "Rejecting connect to a second address");
            return Err(Error::AddressConflict {
                existing: existing.clone(),
                requested: address,
            });
        }

        let connection = match self.connections.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let physical = self.driver.open(entry.key())?;
                info!(address = %entry.key(), "Creating shared connection");
                let connection = Connection::new(
                    entry.key().clone(),
                    Arc::new(physical),
                    &self.config,
                    self.events_tx.clone(),
                );
                entry.insert(connection)
            }
        };

        debug!(address = %connection.address(), client = %client_name, state = ?connection.state(), "Client connecting");
        connection.connect(Client::new(client_name, callbacks));
        Ok(())
    }

    fn handle_disconnect_all(&mut self, done: DisconnectDone) {
        if self.connections.is_empty() {
            debug!("No shared connections to disconnect");
            done(Ok(()));
            return;
        }

        self.next_barrier_id += 1;
        let barrier = self.next_barrier_id;
        info!(
            barrier,
            connections = self.connections.len(),
            "Disconnecting all shared connections"
        );
        self.barriers
            .insert(barrier, DisconnectBarrier::new(self.connections.len(), done));

        for connection in self.connections.values_mut() {
            let arrivals_tx = self.arrivals_tx.clone();
            connection.disconnect(Box::new(move |result: Result<()>| {
                let _ = arrivals_tx.send(BarrierArrival { barrier, result });
            }));
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match self.connections.get_mut(&event.address) {
            Some(connection) => connection.handle_event(event.kind),
            None => warn!(address = %event.address, "Event for unknown connection"),
        }
    }

    fn handle_arrival(&mut self, arrival: BarrierArrival) {
        let Some(barrier) = self.barriers.get_mut(&arrival.barrier) else {
            warn!(barrier = arrival.barrier, "Disconnect completion for unknown barrier");
            return;
        };
        barrier.arrive(arrival.result);
        if barrier.is_drained() {
            self.barriers.remove(&arrival.barrier);
        }
    }
}
