mod common;
use common::*;

use fibre_csp::{go, run, Chan, Taken, TrySendError};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn put_is_true_when_value_is_taken() {
  let ch = Chan::new();
  let taker = ch.clone();
  let taken = go(async move { taker.take().await });
  let delivered = run(async move { ch.put(42).await });
  assert!(delivered);
  assert_eq!(taken.poll(), Some(Ok(Taken::Value(42))));
}

#[test]
fn put_is_true_when_value_is_buffered() {
  let ch = Chan::buffered(1);
  assert!(run(async move { ch.put(42).await }));
}

#[test]
fn put_and_take_on_closed_channel_do_not_block() {
  let ch = closed::<i32>();
  let (put, take) = run(async move { (ch.put(42).await, ch.take().await) });
  assert!(!put);
  assert_eq!(take, Taken::Closed);
}

#[test]
fn parked_put_is_true_once_taken() {
  let ch = Chan::new();
  let putter = ch.clone();
  let result = go(async move { putter.put(42).await });
  assert_eq!(ch.pending_puts(), 1);
  let taken = run(async move { ch.take().await });
  assert_eq!(taken, Taken::Value(42));
  assert_eq!(result.poll(), Some(Ok(true)));
}

#[test]
fn parked_put_is_false_once_closed() {
  let ch = Chan::new();
  let putter = ch.clone();
  let result = go(async move { putter.put(42).await });
  ch.close();
  assert_eq!(result.poll(), Some(Ok(false)));
}

#[test]
fn parked_take_is_closed_once_closed() {
  let ch = Chan::<i32>::new();
  let taker = ch.clone();
  let result = go(async move { taker.take().await });
  ch.close();
  assert_eq!(result.poll(), Some(Ok(Taken::Closed)));
}

#[test]
fn buffered_values_survive_close() {
  let ch = Chan::buffered(3);
  for i in 0..3 {
    ch.offer(i).unwrap();
  }
  ch.close();
  let values = run(async move { drain_chan(&ch).await });
  assert_eq!(values, vec![0, 1, 2]);
}

#[test]
fn parked_put_moves_into_buffer_when_taken_from() {
  let ch = Chan::buffered(1);
  ch.offer(1).unwrap();
  let putter = ch.clone();
  let second = go(async move { putter.put(2).await });
  assert_eq!(second.poll(), None);

  let first = run({
    let ch = ch.clone();
    async move { ch.take().await }
  });
  assert_eq!(first, Taken::Value(1));
  assert_eq!(second.poll(), Some(Ok(true)));
  assert_eq!(ch.len(), 1);
}

#[test]
fn offer_and_poll_from_outside_any_process() {
  let ch = Chan::buffered(2);
  assert!(ch.offer(42).is_ok());
  assert!(ch.offer(43).is_ok());
  assert_eq!(ch.offer(44), Err(TrySendError::Full(44)));
  assert_eq!(ch.poll(), Some(42));
  assert_eq!(ch.poll(), Some(43));
  assert_eq!(ch.poll(), None);
}

#[test]
fn close_flushes_parked_processes_in_order() {
  let order = Rc::new(RefCell::new(Vec::new()));
  let puts = Chan::new();
  let takes = Chan::<i32>::new();
  for i in 1..=3 {
    let (puts, order) = (puts.clone(), order.clone());
    go(async move {
      let ok = puts.put(i).await;
      order.borrow_mut().push(format!("put {} {}", i, ok));
    });
  }
  for i in 1..=3 {
    let (takes, order) = (takes.clone(), order.clone());
    go(async move {
      let taken = takes.take().await;
      order.borrow_mut().push(format!("take {} {}", i, taken.is_closed()));
    });
  }
  puts.close();
  takes.close();
  assert_eq!(
    *order.borrow(),
    vec!["put 1 false", "put 2 false", "put 3 false", "take 1 true", "take 2 true", "take 3 true"]
  );
}

#[test]
fn fifo_among_parked_putters() {
  let ch = Chan::new();
  for i in 0..ITEMS_LOW {
    let ch = ch.clone();
    go(async move {
      ch.put(i).await;
    });
  }
  let closer = ch.clone();
  let received = run(async move {
    let mut received = Vec::new();
    for _ in 0..ITEMS_LOW {
      received.push(closer.take().await.into_value().unwrap());
    }
    received
  });
  assert_eq!(received, (0..ITEMS_LOW).collect::<Vec<_>>());
}

#[test]
fn put_async_and_take_async_outside_processes() {
  let ch = Chan::new();
  let got = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
  let g = got.clone();
  ch.take_async(move |t| g.lock().push(t));
  let g = got.clone();
  ch.put_async(5, move |ok| assert!(ok));
  ch.put_async(6, |ok| assert!(!ok));
  ch.close();
  ch.take_async(move |t| g.lock().push(t));
  assert_eq!(*got.lock(), vec![Taken::Value(5), Taken::Closed]);
}
