//! Connecting a single client straight to a physical connection, without a
//! directory.
//!
//! 不经过目录，直接将单个客户端连接到物理连接。

use crate::{
    config::ConnectOptions,
    driver::{DriverEvent, DriverState, PhysicalConnection},
    error::{Error, Result},
    guard::CompletionGuard,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Connects `physical` and waits until it is established.
///
/// Driver errors are passed to `on_error` for as long as the driver keeps
/// reporting them, including after this function has returned. The connect
/// resolves on whichever comes first of the synchronous probe and the
/// `Connected` event.
///
/// 连接 `physical` 并等待其建立。驱动错误会一直传递给 `on_error`，包括本函数返回之后。
pub async fn connect<P: PhysicalConnection>(
    physical: &P,
    options: &ConnectOptions,
    mut on_error: impl FnMut(Error) + Send + 'static,
) -> Result<()> {
    let (done_tx, done_rx) = oneshot::channel();
    let mut done = CompletionGuard::new(move |result: Result<()>| {
        let _ = done_tx.send(result);
    });

    let mut events = physical.connect(options);
    if physical.state() == DriverState::Connected {
        debug!("Driver probe reports connected");
        done.fire(Ok(()));
    }

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                DriverEvent::Connected => {
                    done.fire(Ok(()));
                }
                DriverEvent::Error(err) => {
                    warn!(error = %err, "Driver error");
                    on_error(err);
                }
                DriverEvent::Disconnected => info!("Driver reported disconnected"),
            }
        }
        // The driver dropped the attempt without ever connecting.
        done.fire(Err(Error::ChannelClosed));
    });

    done_rx.await.map_err(|_| Error::ChannelClosed)?
}

/// Closes `physical`.
///
/// 关闭 `physical`。
pub async fn disconnect<P: PhysicalConnection>(physical: &P) -> Result<()> {
    physical.close().await?;
    debug!("Physical connection closed");
    Ok(())
}
