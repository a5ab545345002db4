use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use reticulum_core::destination::Destination;
use reticulum_core::testing::{TestIdentity, TestResolver};
use reticulum_core::types::{DestinationHash, IdentityHash, PacketHash, RandomBlob};
use reticulum_transport::dedup::PacketHashlist;
use reticulum_transport::path::{PathEntry, PathTable};
use reticulum_transport::{InterfaceId, InterfaceInfo, InterfaceMode, TransportConfig, TransportEngine};

fn make_dest_hash(i: u32) -> DestinationHash {
    let mut bytes = [0u8; 16];
    bytes[..4].copy_from_slice(&i.to_be_bytes());
    DestinationHash::new(bytes)
}

fn make_packet_hash(i: u32) -> PacketHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&i.to_be_bytes());
    PacketHash::new(bytes)
}

fn make_path_entry(i: u32) -> PathEntry {
    PathEntry::new(
        1_000_000.0,
        IdentityHash::new([0xBB; 16]),
        2,
        InterfaceMode::Full,
        [RandomBlob::from_parts([0; 5], u64::from(i))],
        InterfaceId(0),
        make_packet_hash(i),
    )
}

fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");
    let miss_hash = make_packet_hash(0xFFFF_FFFF);

    for (label, fill) in [("empty", 0u32), ("100K", 100_000), ("400K", 400_000)] {
        let mut list = PacketHashlist::new(1_000_000);
        list.extend((0..fill).map(make_packet_hash));

        group.bench_with_input(BenchmarkId::new("contains_miss", label), &list, |b, l| {
            b.iter(|| l.contains(&miss_hash));
        });
    }

    group.bench_function("insert_at_capacity", |b| {
        b.iter_custom(|iters| {
            let mut list = PacketHashlist::new(10_000);
            list.extend((0..10_000).map(make_packet_hash));
            let start = std::time::Instant::now();
            for i in 0..iters {
                list.insert(make_packet_hash(10_000 + i as u32));
            }
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_path_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_table");
    let now = 1_000_000.0;

    for (label, count) in [("100", 100u32), ("1K", 1_000), ("10K", 10_000)] {
        let mut table = PathTable::new();
        for i in 0..count {
            table.insert(make_dest_hash(i), make_path_entry(i));
        }

        let hit = make_dest_hash(count / 2);
        let miss = make_dest_hash(0xFFFF_FFFF);

        group.bench_with_input(BenchmarkId::new("has_path_hit", label), &table, |b, t| {
            b.iter(|| t.has_path(&hit, now));
        });
        group.bench_with_input(BenchmarkId::new("has_path_miss", label), &table, |b, t| {
            b.iter(|| t.has_path(&miss, now));
        });
        group.bench_with_input(BenchmarkId::new("next_hop_hit", label), &table, |b, t| {
            b.iter(|| t.next_hop(&hit, now));
        });
    }

    group.finish();
}

fn bench_inbound_announce(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    let remote = Arc::new(TestIdentity::from_seed(2));
    let mut origin = TransportEngine::with_seed(
        remote.clone(),
        Arc::new(TestResolver),
        TransportConfig::default(),
        1,
    );
    origin.register_interface(InterfaceInfo::new("out"));
    let destination = Destination::single(remote, "bench", &["svc"]);
    let hash = *destination.hash();
    origin.register_destination(destination).unwrap();

    let frames: Vec<_> = (0..64)
        .filter_map(|i| {
            let actions = origin.announce(&hash, None, f64::from(i)).ok()?;
            reticulum_transport::action::transmissions(&actions)
                .into_iter()
                .next()
                .map(|(_, raw)| raw)
        })
        .collect();

    group.bench_function("inbound_announce", |b| {
        b.iter_custom(|iters| {
            let mut engine = TransportEngine::with_seed(
                Arc::new(TestIdentity::from_seed(1)),
                Arc::new(TestResolver),
                TransportConfig::transport(),
                7,
            );
            let iface = engine.register_interface(InterfaceInfo::new("in"));
            let start = std::time::Instant::now();
            for i in 0..iters {
                let raw = frames[i as usize % frames.len()].clone();
                engine.inbound(raw, iface, 100.0 + i as f64);
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dedup, bench_path_table, bench_inbound_announce);
criterion_main!(benches);
