//! Benchmarks for the per-destination enqueue/dequeue hot path (§4.10's
//! gradient scheduler calls these once per selected solution per tick).

use std::sync::Arc;

use bpf_algorithms::clock::Timestamp;
use bpf_algorithms::{AntiStarvationAlgorithm, AsapTuning, ZlrTuning};
use bpf_pool::PacketPool;
use bpf_queue::{BinQueueMgr, DropPolicy, QueueDepths};
use bpf_types::{BinIndex, DstVec, LatencyClass, TimestampMode};
use criterion::{criterion_group, criterion_main, Criterion};

fn mgr(algorithm: AntiStarvationAlgorithm) -> BinQueueMgr {
    let depths = Arc::new(QueueDepths::local());
    let pool = Arc::new(PacketPool::new_standalone());
    BinQueueMgr::new(
        BinIndex(1),
        false,
        DropPolicy::Head,
        depths,
        pool,
        algorithm,
        ZlrTuning::default(),
        AsapTuning::default(),
    )
}

fn bench_enqueue_dequeue_roundtrip(c: &mut Criterion) {
    let mut bq = mgr(AntiStarvationAlgorithm::Base);
    let pool = PacketPool::new_standalone();
    let t = Timestamp::from_millis(0);

    c.bench_function("bin_queue_mgr_enqueue_dequeue_1kb", |b| {
        b.iter(|| {
            let mut pkt = pool.get(TimestampMode::None).unwrap();
            pkt.meta.latency_class = LatencyClass::NormalLatency;
            pkt.data = vec![0u8; 1024];
            bq.enqueue(t, pkt).unwrap();
            let out = bq.dequeue(t, LatencyClass::NormalLatency, u32::MAX, DstVec::single(BinIndex(1))).unwrap();
            criterion::black_box(out);
        })
    });
}

fn bench_zlr_injection_path(c: &mut Criterion) {
    let mut bq = mgr(AntiStarvationAlgorithm::Asap);
    let pool = PacketPool::new_standalone();
    let t = Timestamp::from_millis(0);

    // Prime the queue with a steady backlog so ZLR's windowed minimum
    // clears HWM, exercising the zombie-injection branch on every dequeue.
    for _ in 0..20 {
        let mut pkt = pool.get(TimestampMode::None).unwrap();
        pkt.meta.latency_class = LatencyClass::NormalLatency;
        pkt.data = vec![0u8; 8000];
        bq.enqueue(t, pkt).unwrap();
    }

    c.bench_function("bin_queue_mgr_dequeue_with_zlr_injection", |b| {
        b.iter(|| {
            let mut pkt = pool.get(TimestampMode::None).unwrap();
            pkt.meta.latency_class = LatencyClass::NormalLatency;
            pkt.data = vec![0u8; 1000];
            bq.enqueue(t, pkt).unwrap();
            let out = bq.dequeue(t, LatencyClass::NormalLatency, u32::MAX, DstVec::single(BinIndex(1))).unwrap();
            criterion::black_box(out);
        })
    });
}

criterion_group!(benches, bench_enqueue_dequeue_roundtrip, bench_zlr_injection_path);
criterion_main!(benches);
