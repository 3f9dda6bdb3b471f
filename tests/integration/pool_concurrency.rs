//! Pool bounds under concurrent callers.
//!
//! More threads than sessions hammer the mapper; the pool must never hand
//! out more than its capacity and must balance every acquisition with a
//! release, including on failing calls.

#![allow(missing_docs)]

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use gqlmap::testkit::ScriptedConnector;
use gqlmap::{
    Arg, DescriptorStore, ExecResult, InterfaceDescriptor, Mapper, MethodDescriptor, Output,
    PoolOptions, QueryExecutor, RawResult, ResultShape, SessionPool,
};

const CAPACITY: usize = 3;
const THREADS: usize = 12;
const CALLS_PER_THREAD: usize = 5;

fn build(connector: Arc<ScriptedConnector>) -> Arc<Mapper> {
    let store = Arc::new(DescriptorStore::default());
    store
        .register(
            InterfaceDescriptor::new("CounterDao")
                .space("metrics")
                .method(
                    MethodDescriptor::new(
                        "countBy",
                        "MATCH (n:hit) WHERE n.bucket == ${bucket} RETURN count(n)",
                        ResultShape::Count,
                    )
                    .params(["bucket"]),
                )
                .method(
                    MethodDescriptor::new(
                        "countElsewhere",
                        "MATCH (n:hit) RETURN count(n)",
                        ResultShape::Count,
                    )
                    .space("archive"),
                ),
        )
        .expect("register");
    let pool = SessionPool::new(
        connector,
        PoolOptions {
            capacity: CAPACITY,
            min_idle: 1,
        },
    )
    .expect("pool");
    Arc::new(Mapper::new(store, QueryExecutor::new(pool, "default")))
}

#[test]
fn parallel_invokes_respect_capacity() {
    let connector = Arc::new(ScriptedConnector::with_latency(
        |_, _| ExecResult::ok(RawResult::scalar("count(n)", 1i64)),
        Duration::from_millis(2),
    ));
    let mapper = build(connector.clone());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let mapper = Arc::clone(&mapper);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..CALLS_PER_THREAD {
                    let method = if (t + i) % 2 == 0 {
                        "countElsewhere"
                    } else {
                        "countBy"
                    };
                    let mut args = if method == "countBy" {
                        vec![Arg::from(format!("b{t}"))]
                    } else {
                        Vec::new()
                    };
                    let out = mapper
                        .invoke("CounterDao", method, &mut args)
                        .expect("invoke");
                    assert_eq!(out, Output::Count(1));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker");
    }

    let snap = mapper.pool().snapshot();
    let calls = (THREADS * CALLS_PER_THREAD) as u64;
    assert!(snap.peak_checked_out <= CAPACITY, "{snap:?}");
    assert!(snap.live <= CAPACITY, "{snap:?}");
    assert_eq!(snap.checked_out, 0);
    assert_eq!(snap.acquisitions, calls);
    assert_eq!(snap.releases, calls);
    assert!(connector.sessions_opened() <= CAPACITY);
}

#[test]
fn failures_under_contention_do_not_leak() {
    let connector = Arc::new(ScriptedConnector::with_latency(
        |_, _| ExecResult::ok(RawResult::scalar("count(n)", 2i64)),
        Duration::from_millis(1),
    ));
    for _ in 0..10 {
        connector.fail_next("transient");
    }
    let mapper = build(connector.clone());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let mapper = Arc::clone(&mapper);
            thread::spawn(move || {
                let mut failures = 0;
                for _ in 0..CALLS_PER_THREAD {
                    let mut args = vec![Arg::from(format!("b{t}"))];
                    if mapper.invoke("CounterDao", "countBy", &mut args).is_err() {
                        failures += 1;
                    }
                }
                failures
            })
        })
        .collect();
    let failures: usize = handles
        .into_iter()
        .map(|h| h.join().expect("worker"))
        .sum();

    assert_eq!(failures, 10);
    let snap = mapper.pool().snapshot();
    assert_eq!(snap.checked_out, 0);
    assert_eq!(snap.acquisitions, snap.releases);
    assert!(snap.peak_checked_out <= CAPACITY);
}
