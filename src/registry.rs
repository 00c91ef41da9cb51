//! The set of clients sharing one physical connection.
//!
//! 共享同一个物理连接的客户端集合。

use crate::error::{Error, Result};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// What a client callback returns. An `Err` is logged and never stops the
/// delivery of the same event to other clients.
///
/// 客户端回调的返回值。`Err` 只会被记录，不会阻止同一事件投递给其他客户端。
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type ErrorCallback = Box<dyn FnMut(&Error) -> CallbackResult + Send>;
type ConnectDoneCallback = Box<dyn FnMut(Option<&Error>) -> CallbackResult + Send>;

/// The callbacks through which a client learns about its shared connection.
///
/// 客户端获知其共享连接状态的回调。
pub struct ClientCallbacks {
    on_error: ErrorCallback,
    on_connect_done: ConnectDoneCallback,
}

impl ClientCallbacks {
    /// Builds callbacks from two closures.
    ///
    /// `on_error` receives every driver error while the client is registered.
    /// `on_connect_done` receives the outcome of each connect the client takes
    /// part in, `None` meaning success.
    ///
    /// 由两个闭包构建回调。
    pub fn new(
        on_error: impl FnMut(&Error) -> CallbackResult + Send + 'static,
        on_connect_done: impl FnMut(Option<&Error>) -> CallbackResult + Send + 'static,
    ) -> Self {
        Self {
            on_error: Box::new(on_error),
            on_connect_done: Box::new(on_connect_done),
        }
    }

    /// Builds callbacks that forward every event into a channel.
    ///
    /// 构建将每个事件转发到通道中的回调。
    pub fn channel() -> (Self, ClientEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let error_tx = tx.clone();
        let callbacks = Self::new(
            move |err| {
                error_tx
                    .send(ClientEvent::Error(err.clone()))
                    .map_err(|_| Error::ChannelClosed.into())
            },
            move |err| {
                let outcome = match err {
                    Some(err) => Err(err.clone()),
                    None => Ok(()),
                };
                tx.send(ClientEvent::ConnectDone(outcome))
                    .map_err(|_| Error::ChannelClosed.into())
            },
        );
        (callbacks, ClientEvents { rx })
    }
}

impl fmt::Debug for ClientCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCallbacks").finish_non_exhaustive()
    }
}

/// An event delivered to a client built with [`ClientCallbacks::channel`].
///
/// 投递给通过 [`ClientCallbacks::channel`] 构建的客户端的事件。
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Outcome of a connect the client took part in.
    /// 客户端参与的一次连接的结果。
    ConnectDone(Result<()>),
    /// A driver error on the shared connection.
    /// 共享连接上的驱动错误。
    Error(Error),
}

/// Receiving side of [`ClientCallbacks::channel`].
///
/// [`ClientCallbacks::channel`] 的接收端。
#[derive(Debug)]
pub struct ClientEvents {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl ClientEvents {
    /// Waits for the next event.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }

    /// Returns an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next connect outcome. Driver errors that arrive in the
    /// meantime are skipped; use [`ClientEvents::recv`] to observe them.
    ///
    /// 等待下一个连接结果。期间到达的驱动错误会被跳过。
    pub async fn connect_done(&mut self) -> Result<()> {
        loop {
            match self.rx.recv().await {
                Some(ClientEvent::ConnectDone(outcome)) => return outcome,
                Some(ClientEvent::Error(err)) => {
                    trace!(error = %err, "Skipping driver error while waiting for connect outcome");
                }
                None => return Err(Error::ChannelClosed),
            }
        }
    }
}

/// A named registrant on a shared connection.
///
/// 共享连接上的一个具名注册者。
#[derive(Debug)]
pub struct Client {
    pub(crate) name: String,
    pub(crate) callbacks: ClientCallbacks,
}

impl Client {
    pub fn new(name: impl Into<String>, callbacks: ClientCallbacks) -> Self {
        Self {
            name: name.into(),
            callbacks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered registry of clients, unique by name.
///
/// 按名称去重的有序客户端注册表。
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Vec<Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `client`, or replaces the callbacks of the existing client with
    /// the same name while keeping its position.
    ///
    /// 插入 `client`；若同名客户端已存在，则原位替换其回调。
    pub fn upsert(&mut self, client: Client) {
        match self.clients.iter_mut().find(|c| c.name == client.name) {
            Some(existing) => {
                trace!(client = %client.name, "Replacing callbacks of registered client");
                existing.callbacks = client.callbacks;
            }
            None => {
                trace!(client = %client.name, "Registering new client");
                self.clients.push(client);
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Delivers a connect outcome to every client, in registration order.
    ///
    /// 按注册顺序向每个客户端投递连接结果。
    pub fn broadcast_connect_done(&mut self, error: Option<&Error>) {
        for client in &mut self.clients {
            if let Err(e) = (client.callbacks.on_connect_done)(error) {
                warn!(client = %client.name, error = %e, "on_connect_done callback failed");
            }
        }
    }

    /// Delivers a driver error to every client, in registration order.
    ///
    /// 按注册顺序向每个客户端投递驱动错误。
    pub fn broadcast_error(&mut self, error: &Error) {
        for client in &mut self.clients {
            if let Err(e) = (client.callbacks.on_error)(error) {
                warn!(client = %client.name, error = %e, "on_error callback failed");
            }
        }
    }

    /// Delivers a connect outcome to a single client.
    ///
    /// 向单个客户端投递连接结果。
    pub fn notify_connect_done(&mut self, name: &str, error: Option<&Error>) {
        if let Some(client) = self.clients.iter_mut().find(|c| c.name == name) {
            if let Err(e) = (client.callbacks.on_connect_done)(error) {
                warn!(client = %client.name, error = %e, "on_connect_done callback failed");
            }
        }
    }
}
