//! The user-facing handle to a directory of shared connections.

use super::{actor::DirectoryActor, command::DirectoryCommand};
use crate::{
    config::Config,
    connection::State,
    driver::Driver,
    error::{Error, Result},
    registry::ClientCallbacks,
};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// A handle to a directory of shared connections.
///
/// The directory maps each store address to one physical connection and
/// multiplexes every client's connect and disconnect onto it. It is created
/// explicitly and handed to the components that need it; clones share the
/// same directory.
///
/// 共享连接目录的句柄。
///
/// 目录将每个存储地址映射到一个物理连接，并将所有客户端的连接和断开请求复用到该连接上。
/// 目录需要显式创建并传递给需要它的组件；克隆的句柄共享同一个目录。
#[derive(Debug, Clone)]
pub struct SharedConnections {
    command_tx: mpsc::Sender<DirectoryCommand>,
}

impl SharedConnections {
    /// Creates a directory backed by `driver` with the default configuration.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// 使用默认配置创建由 `driver` 支持的目录。必须在 tokio 运行时中调用。
    pub fn new<D: Driver>(driver: D) -> Self {
        Self::with_config(driver, Config::default())
    }

    /// Creates a directory backed by `driver` with a custom configuration.
    ///
    /// 使用自定义配置创建由 `driver` 支持的目录。
    pub fn with_config<D: Driver>(driver: D, config: Config) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_channel_capacity.max(1));
        let mut actor = DirectoryActor::new(driver, config, command_rx);

        info!("Shared connection directory created");
        tokio::spawn(async move {
            actor.run().await;
        });

        Self { command_tx }
    }

    /// Registers `client_name` on the shared connection for `address` and
    /// connects it.
    ///
    /// Returns an error right away only when the request cannot be routed:
    /// the directory already shares a different address, or the driver
    /// cannot open a handle. Everything else, including the connect outcome,
    /// is reported through `callbacks`.
    ///
    /// 在 `address` 的共享连接上注册 `client_name` 并连接。
    /// 只有在请求无法路由时才会立即返回错误；其余结果（包括连接结果）都通过 `callbacks` 报告。
    pub async fn connect(
        &self,
        client_name: impl Into<String>,
        address: impl Into<String>,
        callbacks: ClientCallbacks,
    ) -> Result<()> {
        let client_name = client_name.into();
        let address = address.into();
        self.request(|response_tx| DirectoryCommand::Connect {
            client_name,
            address,
            callbacks,
            response_tx,
        })
        .await?
    }

    /// Disconnects every shared connection.
    ///
    /// Resolves once every connection has closed, or with the first close
    /// error. Resolves immediately if nothing was ever connected.
    ///
    /// 断开所有共享连接。在所有连接关闭后返回，或在第一个关闭错误时返回。
    pub async fn disconnect_all(&self) -> Result<()> {
        self.request(|response_tx| DirectoryCommand::DisconnectAll { response_tx })
            .await?
    }

    /// Number of clients registered for `address`, 0 if the address is unknown.
    ///
    /// Introspection only.
    pub async fn clients_count(&self, address: &str) -> Result<usize> {
        let address = address.to_string();
        self.request(|response_tx| DirectoryCommand::ClientsCount {
            address,
            response_tx,
        })
        .await
    }

    /// State of the connection for `address`, if the directory has one.
    pub async fn state(&self, address: &str) -> Result<Option<State>> {
        let address = address.to_string();
        self.request(|response_tx| DirectoryCommand::State {
            address,
            response_tx,
        })
        .await
    }

    /// Stops the directory task. Physical connections are not closed; call
    /// [`SharedConnections::disconnect_all`] first.
    ///
    /// 停止目录任务。不会关闭物理连接，请先调用 [`SharedConnections::disconnect_all`]。
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(DirectoryCommand::Shutdown)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> DirectoryCommand,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        response_rx.await.map_err(|_| Error::ChannelClosed)
    }
}
