//! A server with internal and external endpoint pairs: one catalog, one
//! worker pool, two command/notification surfaces.

mod common;

use std::time::Duration;

use proplink::{RequestMode, Server, Value, Variable};

#[test]
fn both_surfaces_serve_the_same_catalog() {
    common::init_logging();
    let internal = common::endpoints();
    let external = common::endpoints();

    let mut server = Server::with_external_endpoints(
        internal.command.as_str(),
        internal.update.as_str(),
        external.command.as_str(),
        external.update.as_str(),
    );
    server
        .register_variable(Variable::new("exposure", 100.0))
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut inside = common::client(&internal);
    inside.open().expect("internal client should open");
    let mut outside = common::client(&external);
    outside.open().expect("external client should open");

    // A write arriving on the internal router is visible externally.
    let result = inside
        .set_variable("exposure", 150.0, RequestMode::Sync, None)
        .expect("request should be submitted")
        .expect("sync mode returns a result");
    assert!(result.success);
    assert_eq!(
        outside
            .get_variable("exposure")
            .expect("external read should succeed"),
        Value::Float(150.0)
    );

    inside.close();
    outside.close();
    server.stop();
}

#[test]
fn notifications_fan_out_on_both_surfaces() {
    common::init_logging();
    let internal = common::endpoints();
    let external = common::endpoints();

    let mut server = Server::with_external_endpoints(
        internal.command.as_str(),
        internal.update.as_str(),
        external.command.as_str(),
        external.update.as_str(),
    );
    server
        .register_variable(Variable::new("fps", 30i64))
        .expect("registration should succeed");
    server.start().expect("server should start");

    let (in_tx, in_rx) = crossbeam::channel::unbounded();
    let mut inside = common::client(&internal);
    inside.register_callback("fps", move |value| {
        let _ = in_tx.send(value.clone());
    });
    inside.open().expect("internal client should open");

    let (out_tx, out_rx) = crossbeam::channel::unbounded();
    let mut outside = common::client(&external);
    outside.register_callback("fps", move |value| {
        let _ = out_tx.send(value.clone());
    });
    outside.open().expect("external client should open");

    std::thread::sleep(common::SUBSCRIBE_SETTLE);
    server.set_variable("fps", 60i64);

    assert_eq!(
        in_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("internal subscriber should hear the change"),
        Value::Int(60)
    );
    assert_eq!(
        out_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("external subscriber should hear the change"),
        Value::Int(60)
    );

    inside.close();
    outside.close();
    server.stop();
}
