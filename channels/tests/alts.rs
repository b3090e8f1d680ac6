mod common;
use common::*;

use fibre_csp::{alts, go, run, timeout, AltValue, AltsOptions, Chan, Chosen, Op, Taken};
use std::time::Instant;

#[test]
fn parked_take_select_reports_the_channel_that_delivered() {
  let (ch1, ch2) = (Chan::new(), Chan::new());
  let ops = vec![Op::Take(ch1.clone()), Op::Take(ch2.clone())];
  let result = go(async move { alts(ops, AltsOptions::new().priority(true)).await });

  let putter = ch1.clone();
  go(async move {
    putter.put(1).await;
  });

  let selected = run(async move { result.take().await }).into_value().unwrap().unwrap();
  assert_eq!(selected.channel, Chosen::Operand { index: 0, channel: ch1 });
  assert_eq!(selected.value, AltValue::Taken(Taken::Value(1)));
  assert_eq!(ch2.pending_takes(), 0);
}

#[test]
fn parked_put_select_reports_the_channel_that_accepted() {
  let (ch1, ch2) = (Chan::new(), Chan::new());
  let ops = vec![Op::Put(ch1.clone(), 1), Op::Put(ch2.clone(), 1)];
  let result = go(async move { alts(ops, AltsOptions::new().priority(true)).await });

  let taker = ch1.clone();
  let taken = go(async move { taker.take().await });

  let selected = result.poll().unwrap().unwrap();
  assert_eq!(selected.index(), Some(0));
  assert_eq!(selected.value, AltValue::Put(true));
  assert_eq!(taken.poll(), Some(Ok(Taken::Value(1))));
  assert_eq!(ch2.pending_puts(), 0);
}

#[test]
fn default_is_returned_only_when_nothing_is_ready() {
  let ch = Chan::buffered(1);
  let selected = run({
    let ch = ch.clone();
    async move {
      let first = alts([Op::Take(ch.clone())], AltsOptions::new().default_value("none")).await;
      ch.put("one").await;
      let second = alts([Op::Take(ch.clone())], AltsOptions::new().default_value("none")).await;
      (first, second)
    }
  });
  assert_eq!(selected.0.value, AltValue::Default("none"));
  assert_eq!(selected.0.channel, Chosen::Default);
  assert_eq!(selected.1.value, AltValue::Taken(Taken::Value("one")));
  assert_eq!(selected.1.channel, Chosen::Operand { index: 0, channel: ch });
}

#[test]
fn priority_takes_buffered_values_in_order() {
  let chans: Vec<Chan<usize>> = (0..ITEMS_LOW).map(|_| Chan::buffered(1)).collect();
  for (i, ch) in chans.iter().enumerate() {
    ch.offer(i).unwrap();
  }
  let results = run(async move {
    let mut results = Vec::new();
    for _ in 0..chans.len() {
      let ops = chans.iter().cloned().map(Op::Take);
      results.push(alts(ops, AltsOptions::new().priority(true)).await.into_taken().unwrap());
    }
    results
  });
  assert_eq!(results, (0..ITEMS_LOW).collect::<Vec<_>>());
}

#[test]
fn random_order_drains_every_channel_once() {
  let chans: Vec<Chan<usize>> = (0..ITEMS_LOW).map(|_| Chan::buffered(1)).collect();
  for (i, ch) in chans.iter().enumerate() {
    ch.offer(i).unwrap();
  }
  let mut results = run(async move {
    let mut results = Vec::new();
    for _ in 0..chans.len() {
      results.push(alts(chans.iter().cloned().map(Op::Take), AltsOptions::new()).await.into_taken().unwrap());
    }
    results
  });
  assert_ne!(results, (0..ITEMS_LOW).collect::<Vec<_>>(), "random order matched priority order");
  results.sort_unstable();
  assert_eq!(results, (0..ITEMS_LOW).collect::<Vec<_>>());
}

#[test]
fn timeout_operand_wins_when_nothing_else_is_ready() {
  let never = Chan::<u8>::new();
  let start = Instant::now();
  let selected = run({
    let never = never.clone();
    async move { alts([Op::Take(never), Op::Take(timeout(SHORT_TIMEOUT))], AltsOptions::new()).await }
  });
  assert!(start.elapsed() >= SHORT_TIMEOUT);
  assert_eq!(selected.index(), Some(1));
  assert_eq!(selected.value, AltValue::Taken(Taken::Closed));
  // The losing registration is stale.
  assert_eq!(never.pending_takes(), 0);
}

#[test]
fn ready_operand_beats_timeout() {
  let ch = Chan::buffered(1);
  ch.offer(3u8).unwrap();
  let selected = run(async move {
    alts([Op::Take(timeout(LONG_TIMEOUT)), Op::Take(ch)], AltsOptions::new().priority(true)).await
  });
  assert_eq!(selected.into_taken(), Some(3));
}

#[test]
fn select_on_same_channel_pairs_with_other_processes() {
  let ch = Chan::new();
  let ops = vec![Op::Put(ch.clone(), 10), Op::Take(ch.clone())];
  let result = go(async move { alts(ops, AltsOptions::new()).await });
  assert_eq!(result.poll(), None);

  let taken = run(async move { ch.take().await });
  assert_eq!(taken, Taken::Value(10));
  let selected = result.poll().unwrap().unwrap();
  assert_eq!(selected.index(), Some(0));
  assert_eq!(selected.value, AltValue::Put(true));
}
