// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Log broker fed by several in-process loggers.

use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sysvipc::{Error, IpcConfig, Key, LogBroker, Logger, MessageQueue, Termination};

static COUNTER: AtomicI32 = AtomicI32::new(0);

fn unique_key() -> Key {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) & 0xfff;
    let pid = (std::process::id() as i32) & 0x7fff;
    let key = Key::new(0x1500_0000 | (pid << 12) | n);
    drop(MessageQueue::get_or_create(key, 0o600, true));
    key
}

fn config(key: Key) -> IpcConfig {
    IpcConfig {
        log_queue_key: key,
        permissions: 0o600,
        ..IpcConfig::default()
    }
}

#[test]
fn logger_needs_a_broker() {
    let key = unique_key();
    let err = Logger::from_config("orphan", &config(key)).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn one_broker_per_key() {
    let cfg = config(unique_key());
    let _first = LogBroker::from_config(&cfg).expect("broker");
    assert!(matches!(
        LogBroker::from_config(&cfg),
        Err(Error::AlreadyExists { .. })
    ));
}

#[test]
fn run_prints_until_termination() {
    let cfg = config(unique_key());
    let t = Termination::detached();
    let broker = LogBroker::from_config(&cfg)
        .expect("broker")
        .with_termination(t);
    let logger = Logger::from_config("nav", &cfg).expect("logger");
    let probe = broker.queue().copy();

    let runner = thread::spawn(move || {
        let mut out = Vec::new();
        let res = broker.run(&mut out);
        (res, String::from_utf8(out).expect("utf8"))
    });

    logger.info("takeoff").expect("send");
    logger.warning("wind 12 m/s").expect("send");
    logger.error("gps lost").expect("send");

    let deadline = Instant::now() + Duration::from_secs(5);
    while probe.pending().expect("pending") > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    t.request();
    // Wake the broker if it is already parked in msgrcv.
    logger.debug("wake").expect("send");

    let (res, text) = runner.join().expect("join");
    res.expect("termination is a clean shutdown");
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines.len() >= 3, "{text}");
    assert!(lines[0].ends_with("): takeoff"));
    assert!(lines[0].contains("] INFO nav("));
    assert!(lines[1].contains("] WARNING nav("));
    assert!(lines[2].contains("] ERROR nav("));
    assert!(lines[2].ends_with("gps lost"));
}

#[test]
fn loggers_from_many_threads() {
    // Kept under the default queue capacity (16 KiB) since nothing drains
    // until every thread is done.
    const THREADS: usize = 4;
    const EACH: usize = 10;

    let cfg = config(unique_key());
    let broker = LogBroker::from_config(&cfg).expect("broker");
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cfg = cfg;
            thread::spawn(move || {
                let log = Logger::from_config(&format!("worker-{i}"), &cfg).expect("logger");
                for n in 0..EACH {
                    log.info(&format!("tick {n}")).expect("send");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("join");
    }

    let mut out = Vec::new();
    assert_eq!(broker.drain(&mut out).expect("drain"), THREADS * EACH);
    let text = String::from_utf8(out).expect("utf8");
    for i in 0..THREADS {
        let tag = format!(" worker-{i}(");
        assert_eq!(text.lines().filter(|l| l.contains(&tag)).count(), EACH);
    }
}
