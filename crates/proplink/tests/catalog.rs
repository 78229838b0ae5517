//! End-to-end request/response behavior over real sockets.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proplink::{ClientError, RequestMode, Server, Value, Variable};

#[test]
fn set_and_get_round_trip() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server
        .register_variable(Variable::new("exposure", 100.0))
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    let all = client.get_all_variables().expect("catalog should be readable");
    assert_eq!(all.get("exposure"), Some(&Value::Float(100.0)));

    let result = client
        .set_variable("exposure", 150.0, RequestMode::Sync, None)
        .expect("request should be submitted")
        .expect("sync mode returns a result");
    assert!(result.success, "unexpected failure: {}", result.message);
    assert_eq!(result.message, "Variable updated: exposure");

    assert_eq!(
        client.get_variable("exposure").expect("value should be readable"),
        Value::Float(150.0)
    );
    assert_eq!(server.variable("exposure"), Some(Value::Float(150.0)));

    client.close();
    server.stop();
}

#[test]
fn read_only_variables_reject_client_writes() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server
        .register_variable(Variable::read_only("connected", true))
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    let result = client
        .set_variable("connected", false, RequestMode::Sync, None)
        .expect("request should be submitted")
        .expect("sync mode returns a result");
    assert!(!result.success);
    assert_eq!(result.message, "Variable connected is READ ONLY");
    assert_eq!(server.variable("connected"), Some(Value::Bool(true)));

    // The server itself may still write it.
    server.set_variable("connected", false);
    assert_eq!(server.variable("connected"), Some(Value::Bool(false)));

    client.close();
    server.stop();
}

#[test]
fn type_mismatch_keeps_the_stored_value() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server
        .register_variable(Variable::new("fps", 30i64))
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    let result = client
        .set_variable("fps", "high", RequestMode::Sync, None)
        .expect("request should be submitted")
        .expect("sync mode returns a result");
    assert!(!result.success);
    assert!(
        result.message.starts_with("Type mismatch"),
        "got: {}",
        result.message
    );
    assert_eq!(
        client.get_variable("fps").expect("value should be readable"),
        Value::Int(30)
    );

    client.close();
    server.stop();
}

#[test]
fn triggers_execute_and_unknown_names_fail() {
    common::init_logging();
    let endpoints = common::endpoints();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);

    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server
        .register_trigger("capture", move || {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    assert_eq!(
        client.get_all_triggers().expect("trigger list should be readable"),
        vec!["capture".to_string()]
    );

    for _ in 0..5 {
        let result = client
            .execute_trigger("capture", RequestMode::Sync, None)
            .expect("request should be submitted")
            .expect("sync mode returns a result");
        assert!(result.success);
        assert_eq!(result.message, "Trigger executed: capture");
    }
    assert_eq!(count.load(Ordering::SeqCst), 5);

    let result = client
        .execute_trigger("missing", RequestMode::Sync, None)
        .expect("request should be submitted")
        .expect("sync mode returns a result");
    assert!(!result.success);
    assert_eq!(result.message, "Failed to execute trigger: missing");

    client.close();
    server.stop();
}

#[test]
fn unknown_variable_reads_are_in_band_errors() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    match client.get_variable("ghost") {
        Err(ClientError::ErrorResponse(message)) => {
            assert_eq!(message, "Variable not found: ghost");
        }
        other => panic!("expected an error response, got {other:?}"),
    }

    client.close();
    server.stop();
}

#[test]
fn async_requests_complete_through_the_callback() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server
        .register_variable(Variable::new("exposure", 100.0))
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    let (tx, rx) = crossbeam::channel::bounded(1);
    let returned = client
        .set_variable(
            "exposure",
            125.0,
            RequestMode::Async,
            Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        )
        .expect("request should be submitted");
    assert!(returned.is_none(), "async mode must not block on the reply");

    let result = rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("callback should be invoked from the I/O thread");
    assert!(result.success);
    assert_eq!(result.message, "Variable updated: exposure");

    client.close();
    server.stop();
}

#[test]
fn a_panicking_change_callback_surfaces_in_band() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server
        .register_variable_with(Variable::new("exposure", 100.0), |_| {
            panic!("user callback bug")
        })
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    let result = client
        .set_variable("exposure", 200.0, RequestMode::Sync, None)
        .expect("request should be submitted")
        .expect("sync mode returns a result");
    assert!(!result.success);
    assert_eq!(result.message, "Exception occurred in server-side callback");
    // State was updated before the callback ran.
    assert_eq!(server.variable("exposure"), Some(Value::Float(200.0)));

    client.close();
    server.stop();
}
