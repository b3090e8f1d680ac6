use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use fibre_csp::{alts, go, run, AltsOptions, Chan, Op, Taken};

const ITEM_VALUE: u64 = 42;
const ITEM_COUNTS: [usize; 2] = [1_000, 10_000];

// Two processes handing values across an unbuffered channel: every put parks
// or completes a parked take, so each item costs one full trampoline round.
fn rendezvous_ping(num_items: usize) -> u64 {
  let ch = Chan::new();
  let producer = ch.clone();
  go(async move {
    for _ in 0..num_items {
      producer.put(ITEM_VALUE).await;
    }
    producer.close();
  });
  run(async move {
    let mut sum = 0;
    while let Taken::Value(v) = ch.take().await {
      sum += v;
    }
    sum
  })
}

fn buffered_immediate(num_items: usize, capacity: usize) -> u64 {
  let ch = Chan::buffered(capacity);
  run(async move {
    let mut sum = 0;
    for _ in 0..num_items {
      ch.put(ITEM_VALUE).await;
      sum += ch.take().await.into_value().unwrap_or(0);
    }
    sum
  })
}

fn select_across(num_items: usize, fan_in: usize) -> u64 {
  let inputs: Vec<Chan<u64>> = (0..fan_in).map(|_| Chan::new()).collect();
  for (i, input) in inputs.iter().enumerate() {
    let input = input.clone();
    go(async move {
      for _ in (i..num_items).step_by(fan_in) {
        input.put(ITEM_VALUE).await;
      }
    });
  }
  run(async move {
    let mut sum = 0;
    for _ in 0..num_items {
      let ops = inputs.iter().cloned().map(Op::Take);
      sum += alts(ops, AltsOptions::new()).await.into_taken().unwrap_or(0);
    }
    sum
  })
}

fn bench_channels(c: &mut Criterion) {
  let mut group = c.benchmark_group("Chan");
  for &n in ITEM_COUNTS.iter() {
    group.throughput(Throughput::Elements(n as u64));
    group.bench_with_input(BenchmarkId::new("rendezvous", n), &n, |b, &n| {
      b.iter(|| black_box(rendezvous_ping(n)))
    });
    group.bench_with_input(BenchmarkId::new("buffered_immediate", n), &n, |b, &n| {
      b.iter(|| black_box(buffered_immediate(n, 16)))
    });
  }
  group.finish();
}

fn bench_select(c: &mut Criterion) {
  let mut group = c.benchmark_group("Alts");
  for &fan_in in [2usize, 8].iter() {
    let n = ITEM_COUNTS[0];
    group.throughput(Throughput::Elements(n as u64));
    group.bench_with_input(BenchmarkId::new("fan_in", fan_in), &fan_in, |b, &fan_in| {
      b.iter(|| black_box(select_across(n, fan_in)))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_channels, bench_select);
criterion_main!(benches);
