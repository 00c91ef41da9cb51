//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::{
    config::ConnectOptions,
    driver::{Driver, DriverEvent, DriverEvents, DriverState, PhysicalConnection},
    error::{Error, Result},
};
use async_trait::async_trait;
use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::{Notify, mpsc};

pub const TEST_ADDRESS: &str = "localhost:17016/test";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "shared_connections=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug)]
struct MockInner {
    connect_calls: usize,
    close_calls: usize,
    state: DriverState,
    settle_on_connect: bool,
    close_error: Option<String>,
    events_tx: Option<mpsc::UnboundedSender<DriverEvent>>,
    last_options: Option<ConnectOptions>,
}

/// A scripted physical connection.
///
/// Counts connects and closes, lets the test emit driver events for the
/// latest attempt, and can hold a close open until released.
#[derive(Debug, Clone)]
pub struct MockPhysical {
    inner: Arc<Mutex<MockInner>>,
    hold_close: Arc<AtomicBool>,
    close_gate: Arc<Notify>,
}

impl MockPhysical {
    /// A connection whose probe never reports `Connected` on its own; the
    /// test must emit `DriverEvent::Connected`.
    pub fn new() -> Self {
        Self::with_settle(false)
    }

    /// A connection whose probe reports `Connected` right after `connect`.
    pub fn settling() -> Self {
        Self::with_settle(true)
    }

    fn with_settle(settle_on_connect: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                connect_calls: 0,
                close_calls: 0,
                state: DriverState::Disconnected,
                settle_on_connect,
                close_error: None,
                events_tx: None,
                last_options: None,
            })),
            hold_close: Arc::new(AtomicBool::new(false)),
            close_gate: Arc::new(Notify::new()),
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.lock().unwrap().connect_calls
    }

    pub fn close_calls(&self) -> usize {
        self.inner.lock().unwrap().close_calls
    }

    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.inner.lock().unwrap().last_options.clone()
    }

    /// Emits an event on the latest connect attempt's channel.
    pub fn emit(&self, event: DriverEvent) {
        let mut inner = self.inner.lock().unwrap();
        if matches!(event, DriverEvent::Connected) {
            inner.state = DriverState::Connected;
        }
        if let Some(tx) = &inner.events_tx {
            let _ = tx.send(event);
        }
    }

    /// Makes subsequent closes wait for [`MockPhysical::release_close`].
    pub fn hold_close(&self) {
        self.hold_close.store(true, Ordering::SeqCst);
    }

    /// Lets one held close complete.
    pub fn release_close(&self) {
        self.close_gate.notify_one();
    }

    pub fn fail_close(&self, message: &str) {
        self.inner.lock().unwrap().close_error = Some(message.to_string());
    }
}

#[async_trait]
impl PhysicalConnection for MockPhysical {
    fn connect(&self, options: &ConnectOptions) -> DriverEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        inner.connect_calls += 1;
        inner.last_options = Some(options.clone());
        inner.state = if inner.settle_on_connect {
            DriverState::Connected
        } else {
            DriverState::Connecting
        };
        inner.events_tx = Some(tx);
        rx
    }

    async fn close(&self) -> Result<()> {
        if self.hold_close.load(Ordering::SeqCst) {
            self.close_gate.notified().await;
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.state != DriverState::Disconnected {
            inner.close_calls += 1;
            inner.state = DriverState::Disconnected;
        }
        match &inner.close_error {
            Some(message) => Err(Error::driver(message.clone())),
            None => Ok(()),
        }
    }

    fn state(&self) -> DriverState {
        self.inner.lock().unwrap().state
    }
}

/// A driver that hands out clones of one [`MockPhysical`].
#[derive(Debug, Clone)]
pub struct MockDriver {
    pub physical: MockPhysical,
    opened: Arc<Mutex<Vec<String>>>,
    fail_open: bool,
}

impl MockDriver {
    pub fn new(physical: MockPhysical) -> Self {
        Self {
            physical,
            opened: Arc::default(),
            fail_open: false,
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(MockPhysical::new())
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl Driver for MockDriver {
    type Connection = MockPhysical;

    fn open(&self, address: &str) -> Result<MockPhysical> {
        if self.fail_open {
            return Err(Error::driver(format!("cannot open {address}")));
        }
        self.opened.lock().unwrap().push(address.to_string());
        Ok(self.physical.clone())
    }
}
