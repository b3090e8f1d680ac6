mod common;
use common::*;

use fibre_csp::{alts, go, run, AltValue, AltsOptions, Chan, Op, Taken};

// Each of these runs far more immediate operations than the stack could hold if
// every completion resumed its process recursively.

#[test]
fn repeated_takes_from_a_closed_channel() {
  let ch = closed::<i32>();
  let closed_seen = run(async move {
    let mut n = 0;
    for _ in 0..ITEMS_HIGH {
      if ch.take().await == Taken::Closed {
        n += 1;
      }
    }
    n
  });
  assert_eq!(closed_seen, ITEMS_HIGH);
}

#[test]
fn repeated_puts_on_a_closed_channel() {
  let ch = closed::<i32>();
  let rejected = run(async move {
    let mut n = 0;
    for i in 0..ITEMS_HIGH {
      if !ch.put(i as i32).await {
        n += 1;
      }
    }
    n
  });
  assert_eq!(rejected, ITEMS_HIGH);
}

#[test]
fn repeated_selects_on_a_closed_channel() {
  let ch = closed::<i32>();
  let committed = run(async move {
    let mut n = 0;
    for _ in 0..ITEMS_HIGH {
      let selected = alts([Op::Take(ch.clone()), Op::Put(ch.clone(), 1)], AltsOptions::new()).await;
      match (selected.index(), selected.value) {
        (Some(0), AltValue::Taken(Taken::Closed)) | (Some(1), AltValue::Put(false)) => n += 1,
        other => panic!("unexpected select outcome {:?}", other),
      }
    }
    n
  });
  assert_eq!(committed, ITEMS_HIGH);
}

#[test]
fn repeated_immediate_puts_and_takes() {
  let ch = Chan::buffered(1);
  let sum = run(async move {
    let mut sum = 0usize;
    for i in 0..ITEMS_HIGH {
      ch.put(i).await;
      sum += ch.take().await.into_value().unwrap();
    }
    sum
  });
  assert_eq!(sum, (0..ITEMS_HIGH).sum::<usize>());
}

#[test]
fn long_daisy_chain_of_processes() {
  let leftmost = Chan::new();
  let mut right = leftmost.clone();
  for _ in 0..ITEMS_HIGH {
    let left = right;
    right = Chan::new();
    let next = right.clone();
    go(async move {
      if let Taken::Value(v) = next.take().await {
        left.put(v + 1).await;
      }
    });
  }
  right.put_async(0usize, |_| {});
  let result = run(async move { leftmost.take().await });
  assert_eq!(result, Taken::Value(ITEMS_HIGH));
}

#[test]
fn callbacks_chained_through_the_run_queue() {
  let ch = Chan::new();
  for i in 0..ITEMS_HIGH {
    ch.put_async(i, |ok| assert!(ok));
  }
  let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
  for _ in 0..ITEMS_HIGH {
    let count = count.clone();
    ch.take_async(move |_| {
      count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
  }
  assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), ITEMS_HIGH);
}
