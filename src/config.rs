//! 定义了共享连接的可配置参数。
//! Defines configurable parameters for shared connections.

use std::time::Duration;

/// Environment variables consulted, in order, by [`Config::address_from_env`]
/// when the caller does not supply its own list.
///
/// [`Config::address_from_env`] 默认按顺序查询的环境变量。
pub const DEFAULT_ADDRESS_ENV_KEYS: &[&str] = &["MONGOLAB_URI", "MONGOHQ_URL", "MONGO_PATH"];

/// A structure containing all configurable parameters for a directory of
/// shared connections.
///
/// 包含共享连接目录所有可配置参数的结构体。
#[derive(Debug, Clone)]
pub struct Config {
    /// Options handed to the driver on every physical connect.
    /// 每次物理连接时传递给驱动的选项。
    pub connect_options: ConnectOptions,

    /// What a driver error does to a connect attempt that is still in flight.
    /// 驱动错误对仍在进行中的连接尝试的影响。
    pub driver_error_policy: DriverErrorPolicy,

    /// Capacity of the command channel between handles and the owning task.
    /// 句柄与所属任务之间命令通道的容量。
    pub command_channel_capacity: usize,
}

/// Options for a physical connect.
///
/// 物理连接选项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Enables TCP keep-alive on the physical socket.
    /// 在物理套接字上启用 TCP keep-alive。
    pub keep_alive: bool,
    /// Delay before the first keep-alive probe.
    /// 第一个 keep-alive 探测前的延迟。
    pub keep_alive_initial_delay: Duration,
}

/// Policy applied when the driver reports an error while a connection is
/// still `Connecting`.
///
/// 当连接仍处于 `Connecting` 状态而驱动报告错误时采用的策略。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriverErrorPolicy {
    /// Broadcast the error and keep waiting for the driver to settle with a
    /// later `Connected` or close.
    ///
    /// 广播错误，并继续等待驱动之后的 `Connected` 或关闭事件。
    #[default]
    LeavePending,
    /// Broadcast the error, then fail the attempt for every registered client
    /// and close the physical handle. The connection is `Disconnecting` until
    /// that close completes, then `Disconnected`.
    ///
    /// 广播错误，然后对所有已注册客户端判定本次尝试失败并关闭物理句柄。
    /// 关闭完成前连接处于 `Disconnecting`，之后回到 `Disconnected`。
    FailFast,
}

impl Config {
    /// Resolves the store address from the first non-empty environment
    /// variable in `keys`.
    ///
    /// 从 `keys` 中第一个非空的环境变量解析存储地址。
    pub fn address_from_env(keys: &[&str]) -> Option<String> {
        Self::address_from(keys, |key| std::env::var(key).ok())
    }

    pub(crate) fn address_from(
        keys: &[&str],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        keys.iter()
            .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_options: ConnectOptions::default(),
            driver_error_policy: DriverErrorPolicy::default(),
            command_channel_capacity: 128,
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            keep_alive: true,
            keep_alive_initial_delay: Duration::from_millis(1),
        }
    }
}
