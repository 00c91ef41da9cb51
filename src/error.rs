//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use std::sync::Arc;
use thiserror::Error;

/// The primary error type for the shared connection library.
/// 共享连接库的主要错误类型。
///
/// Errors are cloneable because a single driver failure is broadcast to
/// every client registered on a connection.
///
/// 错误类型可克隆，因为一次驱动错误会广播给连接上注册的所有客户端。
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The directory already manages a different address. Only one address
    /// can be shared per directory.
    ///
    /// 目录已经管理了另一个地址。每个目录只能共享一个地址。
    #[error("already sharing a connection to {existing}, cannot also connect to {requested}")]
    AddressConflict { existing: String, requested: String },

    /// A client asked to connect while the shared connection was being torn down.
    /// 客户端在共享连接正在断开时请求连接。
    #[error("cannot connect to {address} while disconnecting")]
    Disconnecting { address: String },

    /// The physical layer reported a failure.
    /// 物理层报告了一个错误。
    #[error("driver error: {0}")]
    Driver(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// An internal channel for communication between tasks was closed unexpectedly.
    /// 用于任务间通信的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,

    /// A client callback reported a failure while an event was being delivered.
    /// 向客户端投递事件时，客户端回调报告了失败。
    #[error("client callback failed: {0}")]
    Callback(String),
}

impl Error {
    /// Wraps an arbitrary driver failure.
    /// 包装任意驱动错误。
    pub fn driver(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Driver(Arc::from(err.into()))
    }

    /// Returns `true` for failures caused by misuse of the library rather than
    /// by the backing store.
    ///
    /// 对于由库的误用（而非后端存储）引起的错误返回 `true`。
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::AddressConflict { .. } | Error::Disconnecting { .. })
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::AddressConflict { .. } => std::io::Error::new(ErrorKind::InvalidInput, err),
            Error::Disconnecting { .. } => std::io::Error::new(ErrorKind::ConnectionAborted, err),
            Error::Driver(_) => std::io::Error::other(err),
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
            Error::Callback(_) => std::io::Error::other(err),
        }
    }
}
