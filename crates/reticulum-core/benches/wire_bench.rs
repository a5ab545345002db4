use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use reticulum_core::constants::{DestinationType, HeaderType, PacketType, PropagationType};
use reticulum_core::destination::Destination;
use reticulum_core::packet::builder::Packet;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::flags::PacketFlags;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{DestinationHash, IdentityHash};

fn sample(header_type: HeaderType, len: usize) -> RawPacket {
    RawPacket {
        flags: PacketFlags {
            ifac: false,
            header_type,
            propagation_type: match header_type {
                HeaderType::Header1 => PropagationType::Broadcast,
                HeaderType::Header2 => PropagationType::Transport,
            },
            destination_type: DestinationType::Single,
            packet_type: PacketType::Data,
        },
        hops: 3,
        transport_id: (header_type == HeaderType::Header2).then(|| IdentityHash::new([0xCC; 16])),
        destination: DestinationHash::new([0xAA; 16]),
        context: ContextType::None,
        data: Bytes::from(vec![0xBB; len]),
    }
}

fn bench_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet");

    let h1_raw = sample(HeaderType::Header1, 64).serialize();
    let h2_raw = sample(HeaderType::Header2, 64).serialize();

    group.bench_function("parse_header1", |b| {
        b.iter(|| RawPacket::parse_bytes(h1_raw.clone()).unwrap());
    });

    group.bench_function("parse_header2", |b| {
        b.iter(|| RawPacket::parse_bytes(h2_raw.clone()).unwrap());
    });

    let parsed = sample(HeaderType::Header2, 64);
    group.bench_function("serialize_header2", |b| {
        b.iter(|| parsed.serialize());
    });

    group.finish();
}

fn bench_packet_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_hash");
    for len in [0usize, 64, 256, 464] {
        let packet = sample(HeaderType::Header1, len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &packet, |b, p| {
            b.iter(|| p.packet_hash());
        });
    }
    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let dest = Destination::plain("bench", &["wire"]);
    c.bench_function("pack_plain_data", |b| {
        b.iter(|| {
            let mut packet = Packet::data(Bytes::from_static(&[0x42; 128]));
            packet.pack(Some(&dest)).unwrap().len()
        });
    });
}

criterion_group!(benches, bench_packet, bench_packet_hash, bench_pack);
criterion_main!(benches);
