//! Automata Driver - Headless Host
//!
//! Ticks the cascade automaton on a fixed interval and drains published
//! visual batches the way a renderer would.

mod config;
mod render;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

use automata_compute::{Automaton, TracingListener};
use automata_core::{MonotonicClock, StepClock, StepStats};

use config::{print_banner, Config};

/// What one tick did, as seen from the host
struct TickOutcome {
    stats: Option<StepStats>,
    uploaded_bytes: usize,
    /// Lit cells across the batches drained this tick
    lit: usize,
    fading: usize,
    /// Shaded instance data built from those batches
    shaded_bytes: usize,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Config::log_level_from_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    print_banner(&config);

    let clock = Arc::new(MonotonicClock::new());
    let automaton = match Automaton::builder(config.automaton.clone())
        .listener(Arc::new(TracingListener))
        .clock(clock.clone())
        .build()
    {
        Ok(automaton) => automaton,
        Err(e) => {
            error!("Failed to start automaton: {}", e);
            std::process::exit(1);
        }
    };
    let automaton = Arc::new(Mutex::new(automaton));

    let mut interval = tokio::time::interval(config.automaton.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut steps = 0u64;
    let mut uploaded = 0usize;

    info!("▶️ Ticking every {:?}", config.automaton.tick_interval());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let handle = automaton.clone();
                let clock = clock.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || tick_once(&handle, clock.as_ref())).await;

                match outcome {
                    Ok(Ok(outcome)) => {
                        uploaded += outcome.uploaded_bytes;
                        if let Some(stats) = outcome.stats {
                            steps += 1;
                            debug!(
                                step = stats.step,
                                changed = stats.cells_changed,
                                lit = outcome.lit,
                                fading = outcome.fading,
                                shaded_bytes = outcome.shaded_bytes,
                                "tick"
                            );
                            if steps % config.report_every == 0 {
                                report(&automaton, &stats, uploaded);
                            }
                            if config.max_steps.is_some_and(|max| steps >= max) {
                                info!("Reached {} steps", steps);
                                break;
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        error!("Tick failed: {}", e);
                        break;
                    }
                    Err(e) => {
                        error!("Tick task failed: {}", e);
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let automaton = automaton.lock();
    info!(
        "👋 Stopped after {} steps ({} alive, {} bytes uploaded)",
        steps,
        automaton.population(),
        uploaded
    );
}

/// Tick, then turn whatever batches were published into frames
fn tick_once(
    automaton: &Mutex<Automaton>,
    clock: &dyn StepClock,
) -> automata_core::AutomataResult<TickOutcome> {
    let mut automaton = automaton.lock();
    let stats = automaton.tick()?;

    let mut outcome = TickOutcome {
        stats,
        uploaded_bytes: 0,
        lit: 0,
        fading: 0,
        shaded_bytes: 0,
    };
    let Some(buffers) = automaton.instance_buffers() else {
        return Ok(outcome);
    };

    let now = clock.now() as f32;
    for batch in buffers.take_dirty() {
        outcome.uploaded_bytes += buffers.batch_bytes(batch).len();
        if let Some(frame) = render::batch_frame(&automaton, batch, now) {
            trace!(batch = frame.batch, instances = frame.instances.len(), "frame");
            outcome.lit += frame.lit;
            outcome.fading += frame.fading;
            outcome.shaded_bytes += frame.instance_data().len() * std::mem::size_of::<f32>();
        }
    }

    Ok(outcome)
}

fn report(automaton: &Mutex<Automaton>, stats: &StepStats, uploaded: usize) {
    let population = automaton.lock().population();
    info!(
        "Step {}: {} alive, {} changed, {:.1}% skipped, {}µs, {} KiB uploaded",
        stats.step,
        population,
        stats.cells_changed,
        stats.skip_ratio() * 100.0,
        stats.compute_time_us,
        uploaded / 1024
    );
}
