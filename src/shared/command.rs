//! Commands used by the shared connection directory task.

use crate::{connection::State, error::Result, registry::ClientCallbacks};
use tokio::sync::oneshot;

/// Commands sent to the directory task.
///
/// 发送到目录任务的命令。
#[derive(Debug)]
pub(crate) enum DirectoryCommand {
    /// Register a client on the connection for `address` and connect it.
    /// 在 `address` 对应的连接上注册客户端并连接。
    Connect {
        client_name: String,
        address: String,
        callbacks: ClientCallbacks,
        response_tx: oneshot::Sender<Result<()>>,
    },
    /// Disconnect every connection in the directory.
    /// 断开目录中的所有连接。
    DisconnectAll {
        response_tx: oneshot::Sender<Result<()>>,
    },
    /// Number of clients registered for `address`.
    /// `address` 上注册的客户端数量。
    ClientsCount {
        address: String,
        response_tx: oneshot::Sender<usize>,
    },
    /// Current state of the connection for `address`.
    /// `address` 对应连接的当前状态。
    State {
        address: String,
        response_tx: oneshot::Sender<Option<State>>,
    },
    /// Stop the directory task.
    /// 停止目录任务。
    Shutdown,
}
