// src/main.rs

mod classifier;
mod config;
mod geometry;
mod history;
mod session;
mod source;
mod types;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use classifier::PoseLabel;
use history::HistoryStore;
use session::TrackingSession;
use source::ObservationLog;
use types::{Config, IntervalRecord};

struct ReplayStats {
    ticks: u64,
    observations: u64,
    skipped_observations: u64,
    skipped_lines: u64,
    transitions: u64,
    persons_seen: usize,
    records_emitted: usize,
}

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("🧍 Posture Tracking System Starting");
    info!("✓ Configuration loaded");
    info!(
        "Tracking config: standing_threshold={:.1}°, progress_interval={} ticks",
        config.tracking.standing_threshold_deg, config.tracking.progress_interval_ticks
    );

    // Ctrl-C flips the flag; the replay loop checks it between ticks so a
    // stop still routes through finalization and the history merge.
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })?;

    let logs = source::find_observation_logs(&config.input.observations_dir)?;
    if logs.is_empty() {
        error!(
            "No observation logs found in {}",
            config.input.observations_dir
        );
        return Ok(());
    }
    info!("Found {} observation log(s) to replay", logs.len());

    let store = HistoryStore::new(&config.history.path);

    let mut streams_replayed = 0usize;
    let mut total_ticks = 0u64;
    let mut total_transitions = 0u64;
    let mut total_records = 0usize;
    let mut history_size = 0usize;

    for (idx, log_path) in logs.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Replaying log {}/{}: {}",
            idx + 1,
            logs.len(),
            log_path.display()
        );
        info!("========================================\n");

        match replay_log(log_path, &config, &running) {
            Ok((stats, records)) => {
                info!("\n✓ Stream replayed");
                info!("  Ticks: {}", stats.ticks);
                info!(
                    "  Observations: {} ({} skipped)",
                    stats.observations, stats.skipped_observations
                );
                info!("  🔀 Transitions: {}", stats.transitions);
                info!("  🧍 Distinct persons: {}", stats.persons_seen);
                info!("  📋 Intervals emitted: {}", stats.records_emitted);
                if stats.skipped_lines > 0 {
                    warn!(
                        "  ⚠️  Malformed log lines skipped: {}",
                        stats.skipped_lines
                    );
                }

                history_size = store
                    .merge(&records)
                    .context("persisting interval history")?;

                streams_replayed += 1;
                total_ticks += stats.ticks;
                total_transitions += stats.transitions;
                total_records += records.len();
            }
            Err(e) => error!("Failed to replay {}: {:#}", log_path.display(), e),
        }

        if !running.load(Ordering::SeqCst) {
            warn!("Stopped by user before all logs were replayed");
            break;
        }
    }

    info!("\n📊 Final Report:");
    info!("  Streams replayed: {}/{}", streams_replayed, logs.len());
    info!("  Total ticks: {}", total_ticks);
    info!("  Total transitions: {}", total_transitions);
    info!("  Intervals persisted this run: {}", total_records);
    info!(
        "  History '{}' now holds {} record(s)",
        store.path().display(),
        history_size
    );

    Ok(())
}

fn replay_log(
    path: &Path,
    config: &Config,
    running: &AtomicBool,
) -> Result<(ReplayStats, Vec<IntervalRecord>)> {
    let mut log = ObservationLog::open(path)?;
    let mut session = TrackingSession::new(config.tracking.standing_threshold_deg);

    let mut ticks = 0u64;
    let mut observations = 0u64;
    let mut skipped_observations = 0u64;
    let mut transitions = 0u64;
    // Stream-end time for finalization: the last replayed frame's capture
    // timestamp.
    let mut stream_end = 0.0_f64;

    loop {
        if !running.load(Ordering::SeqCst) {
            warn!("⏹️  Replay interrupted, closing open intervals");
            break;
        }

        let frame = match log.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                // A broken stream still gets its open intervals closed and
                // merged; only the history write itself may fail the run.
                error!("Stream read failed after {} tick(s): {:#}", ticks, e);
                break;
            }
        };

        ticks += 1;
        stream_end = frame.timestamp;

        let summary = session.process_tick(&frame.entities, frame.timestamp);
        observations += summary.observed as u64;
        skipped_observations += summary.skipped as u64;
        transitions += summary.transitions as u64;

        if config.tracking.progress_interval_ticks > 0
            && ticks % config.tracking.progress_interval_ticks == 0
        {
            info!(
                "Tick {}: {} person(s) in frame | {} tracked ({} standing, {} sitting) | {} interval(s) closed",
                ticks,
                frame.entities.len(),
                session.entity_count(),
                session.label_count(PoseLabel::Standing),
                session.label_count(PoseLabel::Sitting),
                session.closed_count()
            );
        }
    }

    let persons_seen = session.entity_count();
    let skipped_lines = log.skipped_lines();
    let records = session.finalize(stream_end);

    Ok((
        ReplayStats {
            ticks,
            observations,
            skipped_observations,
            skipped_lines,
            transitions,
            persons_seen,
            records_emitted: records.len(),
        },
        records,
    ))
}
