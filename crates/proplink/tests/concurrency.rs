//! Concurrent clients, reply correlation, and worker-pool isolation.

mod common;

use std::time::{Duration, Instant};

use proplink::{RequestMode, Server, Value, Variable};

#[test]
fn concurrent_writers_lose_no_responses() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str());
    server
        .register_variable(Variable::new("counter", 0i64))
        .expect("registration should succeed");
    server.start().expect("server should start");

    const WRITERS: i64 = 3;
    const WRITES_EACH: i64 = 100;

    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let command = endpoints.command.clone();
        let update = endpoints.update.clone();
        handles.push(std::thread::spawn(move || {
            let mut client = common::client_for(&command, &update);
            client.open().expect("writer should open");
            let mut written = Vec::with_capacity(WRITES_EACH as usize);
            for i in 0..WRITES_EACH {
                // Unique per writer and iteration, never the initial 0.
                let value = 1 + writer * WRITES_EACH + i;
                let result = client
                    .set_variable("counter", value, RequestMode::Sync, None)
                    .expect("request should be submitted")
                    .expect("sync mode returns a result");
                assert!(result.success, "write {value} failed: {}", result.message);
                written.push(value);
            }
            client.close();
            written
        }));
    }

    let mut all_written = Vec::new();
    for handle in handles {
        all_written.extend(handle.join().expect("writer thread should finish"));
    }
    assert_eq!(all_written.len(), (WRITERS * WRITES_EACH) as usize);

    // The surviving value is whichever write completed last.
    let final_value = server.variable("counter").expect("counter should exist");
    match final_value {
        Value::Int(v) => assert!(all_written.contains(&v), "final value {v} was never written"),
        other => panic!("counter changed kind: {other:?}"),
    }

    server.stop();
}

#[test]
fn a_slow_callback_does_not_block_other_clients() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str())
        .with_worker_threads(4);
    server
        .register_variable_with(Variable::new("slow", 0i64), |_| {
            std::thread::sleep(Duration::from_secs(2));
        })
        .expect("registration should succeed");
    server
        .register_variable(Variable::new("fast", 0i64))
        .expect("registration should succeed");
    server.start().expect("server should start");

    // Park one worker inside the slow callback.
    let mut slow_client = common::client(&endpoints);
    slow_client.open().expect("slow client should open");
    slow_client
        .set_variable("slow", 1i64, RequestMode::Async, None)
        .expect("request should be submitted");

    // While it sleeps, another client's requests must keep flowing.
    let mut fast_client = common::client(&endpoints);
    fast_client.open().expect("fast client should open");
    let started = Instant::now();
    for i in 1..=20i64 {
        let result = fast_client
            .set_variable("fast", i, RequestMode::Sync, None)
            .expect("request should be submitted")
            .expect("sync mode returns a result");
        assert!(result.success);
    }
    let elapsed = started.elapsed();
    assert!(
        elapsed < Duration::from_millis(1500),
        "fast client was blocked behind the slow callback for {elapsed:?}"
    );

    fast_client.close();
    slow_client.close();
    server.stop();
}

#[test]
fn replies_are_correlated_not_ordered() {
    common::init_logging();
    let endpoints = common::endpoints();
    let mut server = Server::new(endpoints.command.as_str(), endpoints.update.as_str())
        .with_worker_threads(4);
    server
        .register_variable_with(Variable::new("gated", 0i64), |_| {
            std::thread::sleep(Duration::from_millis(500));
        })
        .expect("registration should succeed");
    server
        .register_variable(Variable::new("quick", 0i64))
        .expect("registration should succeed");
    server.start().expect("server should start");

    let mut client = common::client(&endpoints);
    client.open().expect("client should open");

    // First request is slow, second is fast; the fast reply overtakes the
    // slow one and must still land on the right caller.
    let (slow_tx, slow_rx) = crossbeam::channel::bounded(1);
    client
        .set_variable(
            "gated",
            1i64,
            RequestMode::Async,
            Some(Box::new(move |result| {
                let _ = slow_tx.send(result);
            })),
        )
        .expect("request should be submitted");

    let quick = client
        .set_variable("quick", 1i64, RequestMode::Sync, None)
        .expect("request should be submitted")
        .expect("sync mode returns a result");
    assert!(quick.success);
    assert!(
        slow_rx.try_recv().is_err(),
        "the gated reply should still be outstanding"
    );

    let gated = slow_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("gated reply should eventually arrive");
    assert!(gated.success);

    client.close();
    server.stop();
}
