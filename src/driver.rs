//! Traits for abstracting over the data-store driver.
//!
//! The driver owns the wire protocol. This crate only needs to start a
//! physical connect, observe its outcome, close it, and optionally probe its
//! current state.
//!
//! 数据存储驱动的抽象 trait。
//!
//! 驱动负责线路协议。本库只需要发起物理连接、观察其结果、关闭连接，以及（可选地）探测其当前状态。

use crate::{config::ConnectOptions, error::Result};
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::mpsc;

/// An event reported by the driver for one connect attempt.
///
/// 驱动针对一次连接尝试报告的事件。
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// The physical connection is established.
    /// 物理连接已建立。
    Connected,
    /// The physical connection reported a failure.
    /// 物理连接报告了一个错误。
    Error(crate::error::Error),
    /// The physical connection went away. Informational only.
    /// 物理连接已断开。仅供参考。
    Disconnected,
}

/// The stream of events for one connect attempt.
///
/// 一次连接尝试的事件流。
pub type DriverEvents = mpsc::UnboundedReceiver<DriverEvent>;

/// The state reported by a driver's synchronous probe.
///
/// 驱动同步探测报告的状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriverState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    /// The driver does not expose its state.
    /// 驱动不暴露其状态。
    #[default]
    Unknown,
}

/// A handle to one physical connection.
///
/// Each handle is exclusively owned by the shared connection for its address.
///
/// 单个物理连接的句柄。每个句柄由其地址对应的共享连接独占。
#[async_trait]
pub trait PhysicalConnection: Send + Sync + Debug + 'static {
    /// Starts a physical connect and returns immediately.
    ///
    /// The outcome, and any later errors, arrive on the returned channel.
    /// Failures must be reported as [`DriverEvent::Error`], never by panicking.
    ///
    /// 发起物理连接并立即返回。结果及之后的错误都通过返回的通道送达。
    fn connect(&self, options: &ConnectOptions) -> DriverEvents;

    /// Closes the physical connection, resolving once it is fully closed.
    ///
    /// Closing an already closed connection must be a no-op.
    ///
    /// 关闭物理连接，完全关闭后返回。关闭已关闭的连接必须是空操作。
    async fn close(&self) -> Result<()>;

    /// Synchronously reports the current state, if the driver can tell.
    ///
    /// Consulted right after `connect` so an already settled connection does
    /// not have to wait for its `Connected` event.
    ///
    /// 同步报告当前状态（如果驱动能够提供）。
    fn state(&self) -> DriverState {
        DriverState::Unknown
    }
}

/// A driver that can open physical connection handles by address.
///
/// 可以按地址打开物理连接句柄的驱动。
pub trait Driver: Send + Sync + 'static {
    /// The handle type produced by this driver.
    type Connection: PhysicalConnection;

    /// Creates the handle for `address`. No I/O is expected here; the connect
    /// itself starts with [`PhysicalConnection::connect`].
    ///
    /// 为 `address` 创建句柄。此处不应进行 I/O。
    fn open(&self, address: &str) -> Result<Self::Connection>;
}
