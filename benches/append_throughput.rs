//! Throughput benchmarks for the line buffer and a full redirect pipeline

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use linetap::{LineBuffer, RedirectConfig, Redirector, Sink, StreamObserver, StreamSink};
use std::hint::black_box;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const LINES: usize = 1_000;

struct Counter(AtomicUsize);

impl StreamObserver for Counter {
    fn on_line(&self, line: &str) {
        self.0.fetch_add(line.len(), Ordering::Relaxed);
    }
}

/// Append then drain one batch of lines straight through a buffer
fn bench_buffer_append_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_append_drain");

    for line_len in [16usize, 256, 4096] {
        let mut line = vec![b'x'; line_len];
        line.push(b'\n');
        group.throughput(Throughput::Bytes((line.len() * LINES) as u64));

        group.bench_with_input(BenchmarkId::from_parameter(line_len), &line, |b, line| {
            b.iter(|| {
                let buffer = Arc::new(LineBuffer::new(1024));
                let reader = {
                    let buffer = Arc::clone(&buffer);
                    thread::spawn(move || {
                        let mut count = 0usize;
                        while let Some(byte) = buffer.read_byte() {
                            count += usize::from(byte == b'\n');
                        }
                        count
                    })
                };
                for _ in 0..LINES {
                    buffer.append(line).unwrap();
                }
                buffer.terminate();
                black_box(reader.join().unwrap())
            });
        });
    }

    group.finish();
}

/// Write lines to a redirected sink and wait for every observer callback
fn bench_redirected_sink(c: &mut Criterion) {
    let mut group = c.benchmark_group("redirected_sink");
    let line = "a".repeat(80);
    group.throughput(Throughput::Elements(LINES as u64));

    for observers in [1usize, 4] {
        group.bench_with_input(
            BenchmarkId::new("observers", observers),
            &observers,
            |b, &observers| {
                b.iter(|| {
                    let sink = Arc::new(StreamSink::new("bench", Box::new(io::sink())));
                    let mut redirector =
                        Redirector::start(Arc::clone(&sink) as Arc<dyn Sink>, RedirectConfig::default())
                            .unwrap();
                    let counters: Vec<_> = (0..observers)
                        .map(|_| Arc::new(Counter(AtomicUsize::new(0))))
                        .collect();
                    for counter in &counters {
                        redirector.attach(counter);
                    }

                    {
                        let mut out = sink.lock();
                        for _ in 0..LINES {
                            writeln!(out, "{line}").unwrap();
                        }
                    }
                    redirector.stop();
                    black_box(counters[0].0.load(Ordering::Relaxed))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_buffer_append_drain, bench_redirected_sink);
criterion_main!(benches);
