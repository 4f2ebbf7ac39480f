use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::{thread_rng, Rng};

use libwifi::frame::{DESCRIPTOR_RSN, EAPOL_LLC_SNAP};
use libwifi::parse_frame;

const AP: [u8; 6] = [0xf8, 0x32, 0xe4, 0xad, 0x47, 0xb8];
const STA: [u8; 6] = [0xc0, 0xee, 0xfb, 0x4b, 0xcf, 0x3a];

/// A WPA2 beacon with the usual crowd of elements after the ones the parser reads.
fn beacon() -> Vec<u8> {
    let mut frame = vec![0x80, 0x00, 0x00, 0x00];
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&AP);
    frame.extend_from_slice(&AP);
    frame.extend_from_slice(&[0x60, 0x77]);
    frame.extend_from_slice(&[0x97, 0xa1, 0x27, 0xce, 0xa5, 0, 0, 0]);
    frame.extend_from_slice(&[0x64, 0x00, 0x11, 0x04]);
    frame.extend_from_slice(&[0, 10]);
    frame.extend_from_slice(b"bench-wifi");
    frame.extend_from_slice(&[1, 8, 0x82, 0x84, 0x8b, 0x96, 0x24, 0x30, 0x48, 0x6c]);
    frame.extend_from_slice(&[3, 1, 9]);
    frame.extend_from_slice(&[
        48, 20, 1, 0, 0, 0x0f, 0xac, 4, 1, 0, 0, 0x0f, 0xac, 4, 1, 0, 0, 0x0f, 0xac, 2, 0x0c, 0,
    ]);
    frame.extend_from_slice(&[45, 26]);
    frame.extend_from_slice(&[0; 26]);
    frame.extend_from_slice(&[61, 22]);
    frame.extend_from_slice(&[0; 22]);
    frame.extend_from_slice(&[221, 24, 0x00, 0x50, 0xf2, 2, 1, 1]);
    frame.extend_from_slice(&[0; 18]);
    frame
}

fn message_two() -> Vec<u8> {
    let mut frame = vec![0x08, 0x01, 0x00, 0x00];
    frame.extend_from_slice(&AP);
    frame.extend_from_slice(&STA);
    frame.extend_from_slice(&AP);
    frame.extend_from_slice(&[0x10, 0x00]);
    frame.extend_from_slice(&EAPOL_LLC_SNAP);
    frame.extend_from_slice(&[2, 3, 0, 95, DESCRIPTOR_RSN, 0x01, 0x0a, 0, 16]);
    frame.extend_from_slice(&1u64.to_be_bytes());
    frame.extend_from_slice(&[0xcd; 32]);
    frame.extend_from_slice(&[0; 32]);
    frame.extend_from_slice(&[0x5a; 16]);
    frame.extend_from_slice(&[0, 0]);
    frame
}

pub fn parse_frames(crit: &mut Criterion) {
    let mut rng = thread_rng();
    let mut beacon = beacon();
    let last = beacon.len() - 1;
    let eapol = message_two();

    let mut group = crit.benchmark_group("parsers");
    group.throughput(Throughput::Bytes(beacon.len() as u64));
    // The trailing vendor element is opaque, so scrambling it must never break the parse.
    group.bench_function("beacon", |bencher| {
        bencher.iter(|| {
            beacon[last] = rng.gen();
            assert!(parse_frame(black_box(&beacon), false).is_ok())
        })
    });

    group.throughput(Throughput::Bytes(eapol.len() as u64));
    group.bench_function("eapol message 2", |bencher| {
        bencher.iter(|| assert!(parse_frame(black_box(&eapol), false).is_ok()))
    });
    group.finish()
}

criterion_group!(benches, parse_frames);
criterion_main!(benches);
