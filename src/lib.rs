#![deny(clippy::expect_used, clippy::unwrap_used)]

//! Shares one physical data-store connection between many in-process clients.
//! 在进程内多个客户端之间共享同一个物理数据存储连接。
//!
//! Every client registers under a name on a [`SharedConnections`] directory
//! and sees its own connect outcome and error events, while the directory
//! keeps exactly one physical connection per store address.

pub mod config;
pub mod connection;
pub mod direct;
pub mod driver;
pub mod error;
pub mod guard;
pub mod registry;
pub mod shared;

mod testing;

pub use config::{Config, ConnectOptions, DriverErrorPolicy};
pub use connection::State;
pub use driver::{Driver, DriverEvent, DriverEvents, DriverState, PhysicalConnection};
pub use error::{Error, Result};
pub use guard::CompletionGuard;
pub use registry::{CallbackResult, ClientCallbacks, ClientEvent, ClientEvents};
pub use shared::SharedConnections;
