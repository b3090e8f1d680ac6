//! Two processes bouncing a ball, with a timeout deciding when the game ends.
//!
//! Run with `RUST_LOG=fibre_csp=trace` to watch the scheduler at work.

use fibre_csp::{alts, go, run, timeout, AltValue, AltsOptions, Chan, Op, Taken};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Ball {
  hits: u32,
}

async fn player(name: &'static str, table: Chan<Ball>) {
  while let Taken::Value(mut ball) = table.take().await {
    ball.hits += 1;
    tracing::info!(player = name, hits = ball.hits, "hit");
    if !table.put(ball).await {
      break;
    }
  }
}

fn main() {
  tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

  let table = Chan::new();
  go(player("ping", table.clone()));
  go(player("pong", table.clone()));

  let hits = run(async move {
    table.put(Ball { hits: 0 }).await;
    let game_over = timeout::<Ball>(Duration::from_millis(10));
    let hits = loop {
      // Steal the ball between hits, but stop as soon as time is up.
      let selected = alts([Op::Take(game_over.clone()), Op::Take(table.clone())], AltsOptions::new().priority(true)).await;
      match selected.value {
        AltValue::Taken(Taken::Value(ball)) => {
          if !table.put(ball).await {
            break 0;
          }
        }
        _ => break table.take().await.into_value().map_or(0, |b| b.hits),
      }
    };
    table.close();
    hits
  });
  println!("game over after {} hits", hits);
}
