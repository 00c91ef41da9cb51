//! The directory of shared connections: the public handle, its commands, and
//! the task that owns every `Connection`.
mod actor;
mod command;
mod handle;

pub use handle::SharedConnections;
