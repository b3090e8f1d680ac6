mod common;
use common::*;

use fibre_csp::{alts, run, AltValue, AltsOptions, Chan, Op, Taken};
use std::thread;

// Channel handles are `Send + Sync`: operations from other threads and other
// executors wake the owning scheduler through its run queue.

#[test]
fn tokio_task_feeds_a_scheduler_on_another_thread() {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let ch = Chan::new();
  let producer = ch.clone();
  let handle = rt.spawn(async move {
    tokio::time::sleep(SHORT_TIMEOUT).await;
    for i in 0..ITEMS_LOW {
      assert!(producer.put(i).await);
    }
    producer.close();
  });

  let received = run(async move { drain_chan(&ch).await });
  assert_eq!(received, (0..ITEMS_LOW).collect::<Vec<_>>());
  rt.block_on(handle).unwrap();
}

#[test]
fn scheduler_feeds_a_tokio_task() {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let ch = Chan::<usize>::new();
  let consumer = ch.clone();
  let handle = rt.spawn(async move {
    let mut sum = 0;
    while let Taken::Value(v) = consumer.take().await {
      sum += v;
    }
    sum
  });

  run(async move {
    for i in 0..ITEMS_LOW {
      ch.put(i).await;
    }
    ch.close();
  });
  let sum = rt.block_on(handle).unwrap();
  assert_eq!(sum, (0..ITEMS_LOW).sum::<usize>());
}

#[test]
fn plain_thread_offers_wake_the_scheduler() {
  let ch = Chan::new();
  let producer = ch.clone();
  let t = thread::spawn(move || {
    thread::sleep(SHORT_TIMEOUT);
    for i in 0..ITEMS_LOW {
      while producer.offer(i).is_err() {
        thread::yield_now();
      }
    }
  });
  let received = run(async move {
    let mut received = Vec::new();
    for _ in 0..ITEMS_LOW {
      received.push(ch.take().await.into_value().unwrap());
    }
    received
  });
  t.join().unwrap();
  assert_eq!(received, (0..ITEMS_LOW).collect::<Vec<_>>());
}

#[test]
fn selects_racing_across_threads_deliver_every_value_once() {
  const PRODUCERS: usize = 2;
  const CONSUMERS: usize = 2;
  let (a, b) = (Chan::new(), Chan::new());

  let consumers: Vec<_> = (0..CONSUMERS)
    .map(|_| {
      let (a, b) = (a.clone(), b.clone());
      thread::spawn(move || {
        run(async move {
          let mut received = Vec::new();
          loop {
            match alts([Op::Take(a.clone()), Op::Take(b.clone())], AltsOptions::new()).await.value {
              AltValue::Taken(Taken::Value(v)) => received.push(v),
              _ => return received,
            }
          }
        })
      })
    })
    .collect();

  let producers: Vec<_> = (0..PRODUCERS)
    .map(|p| {
      let (a, b) = (a.clone(), b.clone());
      thread::spawn(move || {
        run(async move {
          for k in 0..ITEMS_MEDIUM {
            let v = p * ITEMS_MEDIUM + k;
            let selected = alts([Op::Put(a.clone(), v), Op::Put(b.clone(), v)], AltsOptions::new()).await;
            assert_eq!(selected.value, AltValue::Put(true));
          }
        })
      })
    })
    .collect();

  for t in producers {
    t.join().unwrap();
  }
  a.close();
  b.close();
  let mut received: Vec<usize> = consumers.into_iter().flat_map(|t| t.join().unwrap()).collect();
  received.sort_unstable();
  assert_eq!(received, (0..PRODUCERS * ITEMS_MEDIUM).collect::<Vec<_>>());
}
