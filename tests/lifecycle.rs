//! End-to-end lifecycle of a shared connection, driven through the public API.

pub mod common;

use common::harness::{
    Action, MONGO_PATH, ScriptedDriver, connect_client, connect_done, init_tracing,
    wait_for_state,
};
use shared_connections::{
    ClientCallbacks, ClientEvent, Config, DriverErrorPolicy, DriverEvent, Error,
    SharedConnections, State,
};

#[tokio::test]
async fn test_first_client_connects_to_driver() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;

    assert!(connect_done(&mut a).await.is_ok());
    assert_eq!(driver.connect_called(), 1);
}

#[tokio::test]
async fn test_second_client_reuses_connection() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![Action::Emit(DriverEvent::Connected)]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    assert!(connect_done(&mut a).await.is_ok());
    assert_eq!(driver.connect_called(), 1);

    let mut b = connect_client(&shared, "b").await;
    assert!(connect_done(&mut b).await.is_ok());
    assert_eq!(driver.connect_called(), 1);
}

#[tokio::test]
async fn test_same_client_name_is_registered_once() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![Action::Emit(DriverEvent::Connected)]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    assert!(connect_done(&mut a).await.is_ok());
    assert_eq!(shared.clients_count(MONGO_PATH).await.unwrap(), 1);

    let mut again = connect_client(&shared, "a").await;
    assert!(connect_done(&mut again).await.is_ok());
    assert_eq!(driver.connect_called(), 1);
    assert_eq!(shared.clients_count(MONGO_PATH).await.unwrap(), 1);
}

#[tokio::test]
async fn test_connected_then_joined_then_disconnected() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    assert!(connect_done(&mut a).await.is_ok());
    assert_eq!(
        shared.state(MONGO_PATH).await.unwrap(),
        Some(State::Connected)
    );

    let mut b = connect_client(&shared, "b").await;
    // Already connected: the acknowledgement is queued before connect returns.
    assert!(matches!(b.try_recv(), Some(ClientEvent::ConnectDone(Ok(())))));
    assert_eq!(driver.connect_called(), 1);

    assert!(shared.disconnect_all().await.is_ok());
    assert_eq!(driver.disconnect_called(), 1);
    assert_eq!(
        shared.state(MONGO_PATH).await.unwrap(),
        Some(State::Disconnected)
    );
}

#[tokio::test]
async fn test_clients_joining_before_connected_event() {
    init_tracing();
    let driver = ScriptedDriver::without_probe(vec![]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    let mut b = connect_client(&shared, "b").await;
    assert_eq!(driver.connect_called(), 1);
    assert_eq!(
        shared.state(MONGO_PATH).await.unwrap(),
        Some(State::Connecting)
    );

    driver.emit(DriverEvent::Connected);

    assert!(connect_done(&mut a).await.is_ok());
    assert!(connect_done(&mut b).await.is_ok());
    assert_eq!(driver.connect_called(), 1);
}

#[tokio::test]
async fn test_disconnect_multiple_clients() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    assert!(connect_done(&mut a).await.is_ok());
    assert_eq!(shared.clients_count(MONGO_PATH).await.unwrap(), 1);
    let mut b = connect_client(&shared, "b").await;
    assert!(connect_done(&mut b).await.is_ok());

    assert!(shared.disconnect_all().await.is_ok());
    assert_eq!(driver.disconnect_called(), 1);

    // A second teardown finds nothing left to close.
    assert!(shared.disconnect_all().await.is_ok());
    assert_eq!(driver.disconnect_called(), 1);
}

#[tokio::test]
async fn test_disconnect_all_surfaces_close_failure() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![Action::FailClose("socket stuck".into())]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    assert!(connect_done(&mut a).await.is_ok());

    let err = shared.disconnect_all().await.unwrap_err();
    assert!(matches!(err, Error::Driver(_)));
    assert!(!err.is_misuse());
}

#[tokio::test]
async fn test_second_address_is_a_configuration_error() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    assert!(connect_done(&mut a).await.is_ok());

    let (callbacks, _events) = ClientCallbacks::channel();
    let err = shared
        .connect("b", "elsewhere:27017/other", callbacks)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AddressConflict { .. }));
    assert!(err.is_misuse());
    assert_eq!(driver.connect_called(), 1);
}

#[tokio::test]
async fn test_fail_fast_policy_reports_driver_error_as_outcome() {
    init_tracing();
    let driver = ScriptedDriver::without_probe(vec![Action::Emit(DriverEvent::Error(
        Error::driver("no primary"),
    ))]);
    let config = Config {
        driver_error_policy: DriverErrorPolicy::FailFast,
        ..Config::default()
    };
    let shared = SharedConnections::with_config(driver.clone(), config);

    let mut a = connect_client(&shared, "a").await;

    let outcome = connect_done(&mut a).await;
    assert!(matches!(outcome, Err(Error::Driver(_))));
    // The failed handle is closed before a retry can start.
    wait_for_state(&shared, State::Disconnected).await;
    assert_eq!(driver.disconnect_called(), 1);

    // Retrying starts a fresh physical connect.
    let mut retry = connect_client(&shared, "a").await;
    driver.emit(DriverEvent::Connected);
    assert!(connect_done(&mut retry).await.is_ok());
    assert_eq!(driver.connect_called(), 2);
}

#[tokio::test]
async fn test_disconnect_all_while_connecting_settles_waiting_clients() {
    init_tracing();
    let driver = ScriptedDriver::without_probe(vec![]);
    let shared = SharedConnections::new(driver.clone());

    let mut a = connect_client(&shared, "a").await;
    let mut b = connect_client(&shared, "b").await;
    assert!(shared.disconnect_all().await.is_ok());

    for events in [&mut a, &mut b] {
        assert!(matches!(
            connect_done(events).await,
            Err(Error::Disconnecting { .. })
        ));
    }

    // The driver finishing the abandoned connect changes nothing.
    driver.emit(DriverEvent::Connected);
    assert_eq!(
        shared.state(MONGO_PATH).await.unwrap(),
        Some(State::Disconnected)
    );
    assert!(a.try_recv().is_none());
}

#[tokio::test]
async fn test_closure_callbacks() {
    init_tracing();
    let driver = ScriptedDriver::with_probe(vec![]);
    let shared = SharedConnections::new(driver.clone());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let mut tx = Some(tx);
    let callbacks = ClientCallbacks::new(
        |err| Err(format!("unexpected driver error: {err}").into()),
        move |err| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(err.map(ToString::to_string));
            }
            Ok(())
        },
    );
    shared.connect("closure", MONGO_PATH, callbacks).await.unwrap();

    assert_eq!(rx.await.unwrap(), None);
}
