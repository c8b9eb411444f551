//! Performance benchmarks for the analysis pipeline

use callprobe::anomaly::OutlierDetector;
use callprobe::packet::{rtp_payload, sip_request};
use callprobe::traffic::TrafficPatternExtractor;
use callprobe::{analyze, ClassifiedPacket, Protocol};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `calls` back-to-back calls of `media_per_call` packets at 20ms
fn capture(calls: usize, media_per_call: usize) -> Vec<ClassifiedPacket> {
    let mut packets = Vec::with_capacity(calls * (media_per_call + 2));
    let mut t = 0.0;
    for c in 0..calls {
        let id = format!("bench-{}", c);
        packets.push(ClassifiedPacket::new(
            t,
            Protocol::Signaling,
            sip_request("INVITE", Some(&id)),
        ));
        for i in 0..media_per_call {
            t += 0.02 + (i % 5) as f64 * 0.0005;
            packets.push(ClassifiedPacket::new(
                t,
                Protocol::Media,
                rtp_payload(i as u16, c as u32, 160),
            ));
        }
        t += 0.1;
        packets.push(ClassifiedPacket::new(t, Protocol::Signaling, sip_request("BYE", Some(&id))));
        t += 0.5;
    }
    packets
}

/// Benchmark the full pipeline over growing captures
fn benchmark_full_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_analysis");
    for calls in [1usize, 10, 50] {
        let packets = capture(calls, 500);
        group.bench_with_input(BenchmarkId::from_parameter(calls), &packets, |b, packets| {
            b.iter(|| black_box(analyze(black_box(packets))));
        });
    }
    group.finish();
}

/// Benchmark isolation-forest fit and scoring alone
fn benchmark_outlier_detection(c: &mut Criterion) {
    let pattern = TrafficPatternExtractor::default().extract(&capture(20, 500));
    let detector = OutlierDetector::default();

    c.bench_function("outlier_detection_10k", |b| {
        b.iter(|| black_box(detector.detect(black_box(&pattern))));
    });
}

criterion_group!(benches, benchmark_full_analysis, benchmark_outlier_detection);
criterion_main!(benches);
