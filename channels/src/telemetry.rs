// src/telemetry.rs

//! Feature-gated (`csp_telemetry`) event and counter collection.
//!
//! The channel, select and scheduler code call into this module at their
//! interesting points (a handler parks, a select commits, a process ends). With
//! the feature disabled every function here is an inlined no-op.

#[cfg(feature = "csp_telemetry")]
pub mod enabled {
  use std::collections::HashMap;
  use std::fmt;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::thread::{self, ThreadId};
  use std::time::Instant;

  use parking_lot::Mutex;

  use crate::scheduler;

  static NEXT_EVENT_SEQUENCE_ID: AtomicUsize = AtomicUsize::new(0);

  /// A single recorded event.
  #[derive(Clone)]
  pub struct TelemetryEvent {
    /// Global sequence number across all events.
    pub seq_id: usize,
    pub timestamp: Instant,
    pub os_thread_id: ThreadId,
    /// The process that was running when the event was recorded, if any.
    pub process_id: Option<u64>,
    /// Usually the id of the channel involved.
    pub item_id: Option<u64>,
    pub location: String,
    pub event_type: String,
    pub message: Option<String>,
  }

  impl fmt::Debug for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TelemetryEvent")
        .field("seq", &self.seq_id)
        .field("os_tid", &self.os_thread_id)
        .field("process", &self.process_id)
        .field("item_id", &self.item_id)
        .field("loc", &self.location)
        .field("evt", &self.event_type)
        .field("msg", &self.message.as_deref().unwrap_or(""))
        .finish()
    }
  }

  type CounterKey = (String, String); // (location, counter_name)

  struct CollectorData {
    events: Vec<TelemetryEvent>,
    counters: HashMap<CounterKey, usize>,
    start_time: Instant,
  }

  impl CollectorData {
    fn new() -> Self {
      CollectorData {
        events: Vec::new(),
        counters: HashMap::new(),
        start_time: Instant::now(),
      }
    }
  }

  lazy_static::lazy_static! {
      static ref GLOBAL_COLLECTOR: Mutex<CollectorData> = Mutex::new(CollectorData::new());
  }

  pub fn log_event_fn(item_id: Option<u64>, location: &str, event_type: &str, message: Option<String>) {
    let event = TelemetryEvent {
      seq_id: NEXT_EVENT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed),
      timestamp: Instant::now(),
      os_thread_id: thread::current().id(),
      process_id: scheduler::current_process(),
      item_id,
      location: location.to_string(),
      event_type: event_type.to_string(),
      message,
    };
    GLOBAL_COLLECTOR.lock().events.push(event);
  }

  pub fn increment_counter_fn(location: &'static str, counter_name: &str) {
    let key = (location.to_string(), counter_name.to_string());
    *GLOBAL_COLLECTOR.lock().counters.entry(key).or_insert(0) += 1;
  }

  /// Returns the current value of a counter, `0` if it was never incremented.
  pub fn counter_value_fn(location: &str, counter_name: &str) -> usize {
    let key = (location.to_string(), counter_name.to_string());
    GLOBAL_COLLECTOR.lock().counters.get(&key).copied().unwrap_or(0)
  }

  /// Returns a copy of every recorded event, in sequence order.
  pub fn events_fn() -> Vec<TelemetryEvent> {
    let mut events = GLOBAL_COLLECTOR.lock().events.clone();
    events.sort_by_key(|e| e.seq_id);
    events
  }

  pub fn print_telemetry_report_fn() {
    let collector = GLOBAL_COLLECTOR.lock();
    println!("\n--- Fibre CSP Telemetry Report (Feature: csp_telemetry) ---");
    println!("Report generated at: {:?}", Instant::now());
    println!("Collection started at: {:?}", collector.start_time);

    if collector.events.is_empty() {
      println!("\n[Events] No detailed events recorded.");
    } else {
      println!("\n[Events] Recorded Events ({}):", collector.events.len());
      let mut sorted_events = collector.events.clone();
      sorted_events.sort_by_key(|e| e.seq_id);

      for event in sorted_events.iter() {
        let time_since_start = event.timestamp.duration_since(collector.start_time);
        let os_tid_short = format!("{:?}", event.os_thread_id)
          .trim_start_matches("ThreadId(")
          .trim_end_matches(')')
          .to_string();

        println!(
          "  +{:<10.6}s [Seq:{:<5}] OS_TID:{:<6} Proc:{:<6} Item:{:<6} Loc:{:<25} Evt:{:<20} Msg: {}",
          time_since_start.as_secs_f64(),
          event.seq_id,
          os_tid_short,
          event.process_id.map_or_else(|| "---".to_string(), |id| id.to_string()),
          event.item_id.map_or_else(|| "N/A".to_string(), |id| id.to_string()),
          event.location,
          event.event_type,
          event.message.as_deref().unwrap_or("")
        );
      }
    }

    if collector.counters.is_empty() {
      println!("\n[Counters] No counters recorded.");
    } else {
      println!("\n[Counters] Recorded Counters ({}):", collector.counters.len());
      let mut sorted_counters: Vec<_> = collector.counters.iter().collect();
      sorted_counters.sort_by_key(|(k, _v)| *k);
      for ((loc, name), count) in sorted_counters {
        println!("  Loc:{:<25} Counter:{:<30} Value: {}", loc, name, count);
      }
    }
    println!("\n--- End of Telemetry Report ---");
  }

  pub fn clear_telemetry_fn() {
    let mut collector = GLOBAL_COLLECTOR.lock();
    collector.events.clear();
    collector.counters.clear();
    collector.start_time = Instant::now();
    NEXT_EVENT_SEQUENCE_ID.store(0, Ordering::Relaxed);
  }
}

#[cfg(not(feature = "csp_telemetry"))]
pub mod disabled {
  #[inline(always)]
  pub fn log_event_fn(_item_id: Option<u64>, _location: &'static str, _event_type: &'static str, _message: Option<String>) {}
  #[inline(always)]
  pub fn increment_counter_fn(_location: &'static str, _counter_name: &'static str) {}
  #[inline(always)]
  pub fn print_telemetry_report_fn() {}
  #[inline(always)]
  pub fn clear_telemetry_fn() {}
}

#[cfg(feature = "csp_telemetry")]
pub use enabled::{
  clear_telemetry_fn as clear_telemetry, counter_value_fn as counter_value, events_fn as events,
  increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report, TelemetryEvent,
};

#[cfg(not(feature = "csp_telemetry"))]
pub use disabled::{
  clear_telemetry_fn as clear_telemetry, increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};
