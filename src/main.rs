// Shakewatch - Demo Entry Point
//
// Runs one detection session end-to-end without a device:
//   1. Parse arguments and load the detector config (JSON file, or defaults).
//   2. Build a synthetic rest / shake / rest accelerometer trace.
//   3. Start a session with the scripted sensor and classifier.
//   4. Print every shake notification as JSON until the trace is done.
//   5. Stop the session and print its statistics.

use std::time::Duration;

use clap::Parser;
use shakewatch::cli::Cli;
use shakewatch::{
    synthetic_shake_trace, Category, EventSource, ScriptedAccelerometer,
    ScriptedClassifier,
};

// ---------------------------------------------------------------------------
// Demo trace shape (milliseconds)
// ---------------------------------------------------------------------------
const REST_MS: i64 = 1500;
const SHAKE_MS: i64 = 800;
const SAMPLE_PERIOD_MS: i64 = 10;
const SHAKE_AMPLITUDE: f32 = 35.0;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Shakewatch demo starting…");

    let config = Cli::parse().load_config()?;

    // ---- Collaborators ----------------------------------------------------
    let trace = synthetic_shake_trace(REST_MS, SHAKE_MS, SAMPLE_PERIOD_MS, SHAKE_AMPLITUDE);
    let replay_time = Duration::from_millis((trace.len() as u64) * SAMPLE_PERIOD_MS as u64);
    let sensor = ScriptedAccelerometer::new(trace)
        .paced(Duration::from_millis(SAMPLE_PERIOD_MS as u64));
    let classifier = ScriptedClassifier::new(vec![
        vec![Category::new("Speech", 0.42), Category::new("Silence", 0.2)],
        vec![Category::new("Glass", 0.71), Category::new("Speech", 0.35)],
        vec![Category::new("Knock", 0.55)],
    ]);

    let mut source = EventSource::new(sensor).with_classifier(classifier);
    let subscription = source.subscribe();

    // ---- Run --------------------------------------------------------------
    source.start(config)?;

    // Enough for the replay plus one debounce period.
    let deadline = std::time::Instant::now() + replay_time + Duration::from_secs(2);
    while let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) {
        if let Some(notification) = subscription.next_timeout(remaining) {
            println!("{}", notification.to_json()?);
        }
    }

    match source.classify() {
        Ok(snapshot) => log::info!("Last classification: {:?}", snapshot),
        Err(e) => log::warn!("No classification: {}", e),
    }

    let stats = source.stats();
    source.stop()?;
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
