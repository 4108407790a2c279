// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Message queue round-trip benchmarks.
//
// Run with:
//   cargo bench --bench msg_queue
//
// Groups:
//   round_trip  : send then receive on one thread, three payload sizes
//   log_record  : one LogRecord built, sent and received
//   semaphore   : signal then wait on one slot

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Local;
use sysvipc::config::SemaphoreId;
use sysvipc::{Key, LogLevel, LogRecord, MessageQueue, MessageType, SemaphoreSet};

const BENCH: MessageType = MessageType::new(42);

// ---------------------------------------------------------------------------
// Raw payloads
// ---------------------------------------------------------------------------

fn round_trip<const N: usize>(q: &MessageQueue) -> [u8; N] {
    q.send([0xABu8; N], BENCH, true).expect("send");
    q.receive::<[u8; N]>(BENCH, true).expect("receive")
}

fn bench_round_trip(c: &mut Criterion) {
    let q = MessageQueue::create(Key::PRIVATE, 0o600).expect("create");
    let mut group = c.benchmark_group("round_trip");

    group.throughput(Throughput::Bytes(8));
    group.bench_function(BenchmarkId::from_parameter("small_8"), |b| {
        b.iter(|| black_box(round_trip::<8>(&q)))
    });
    group.throughput(Throughput::Bytes(256));
    group.bench_function(BenchmarkId::from_parameter("medium_256"), |b| {
        b.iter(|| black_box(round_trip::<256>(&q)))
    });
    group.throughput(Throughput::Bytes(4096));
    group.bench_function(BenchmarkId::from_parameter("large_4096"), |b| {
        b.iter(|| black_box(round_trip::<4096>(&q)))
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Log records
// ---------------------------------------------------------------------------

fn bench_log_record(c: &mut Criterion) {
    let q = MessageQueue::create(Key::PRIVATE, 0o600).expect("create");
    c.bench_function("log_record", |b| {
        b.iter(|| {
            let rec = LogRecord::new(LogLevel::Info, "bench", "steady state", 1, Local::now());
            q.send(rec, MessageType::LOG, true).expect("send");
            black_box(q.receive::<LogRecord>(MessageType::LOG, true).expect("receive"))
        })
    });
}

// ---------------------------------------------------------------------------
// Semaphores
// ---------------------------------------------------------------------------

fn bench_semaphore(c: &mut Criterion) {
    let set = SemaphoreSet::<SemaphoreId>::create(Key::PRIVATE, &SemaphoreId::INITIAL, 0o600)
        .expect("create");
    let lock = set.semaphore(SemaphoreId::StateLock);
    c.bench_function("semaphore", |b| {
        b.iter(|| {
            lock.wait().expect("wait");
            lock.signal().expect("signal");
        })
    });
}

criterion_group!(benches, bench_round_trip, bench_log_record, bench_semaphore);
criterion_main!(benches);
