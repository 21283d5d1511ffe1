#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! CLI entrypoint for the fatigue monitoring engine.
//!
//! Responsibilities:
//! - Parse config/flags and assemble the store, state manager, and evaluator
//! - Initialize tracing and manage log sinks
//! - Offer `--json` mode emitting structured errors to stdout (logs to stderr)
//! - Map domain errors to stable exit codes

mod cli;
mod error_fmt;
mod monitor;
mod simulate;
mod tracing_setup;

use std::fs;

use clap::Parser;
use eyre::WrapErr;
use fatigue_config::Config;

use cli::{Cli, Commands, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use tracing_setup::init_tracing;

fn main() -> eyre::Result<()> {
    // Initialize pretty error reports early
    let _ = color_eyre::install();

    // Set up graceful shutdown handler
    let shutdown = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let shutdown_clone = std::sync::Arc::clone(&shutdown);

    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived shutdown signal, stopping gracefully...");
        shutdown_clone.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        eprintln!("Warning: Failed to set signal handler: {e}");
    }

    if let Err(e) = real_main(shutdown) {
        let json = *JSON_MODE.get().unwrap_or(&false);
        let code = exit_code_for_error(&e);
        if json {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(code);
    }
    Ok(())
}

fn real_main(shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>) -> eyre::Result<()> {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    // 1) Load typed config from TOML; every section falls back to defaults.
    let cfg: Config = match &cli.config {
        Some(path) => {
            let cfg_text =
                fs::read_to_string(path).wrap_err_with(|| format!("read config {path:?}"))?;
            toml::from_str(&cfg_text).wrap_err_with(|| format!("parse config {path:?}"))?
        }
        None => Config::default(),
    };

    // Validate configuration with clear errors
    cfg.validate().wrap_err("invalid configuration")?;

    init_tracing(
        cli.json,
        &cli.log_level,
        cfg.logging.file.as_deref(),
        cfg.logging.rotation.as_deref(),
    );

    match cli.cmd {
        Commands::Monitor { duration_s, stats } => {
            monitor::run_monitor(&cfg, shutdown, duration_s, stats)
        }
        Commands::Simulate { ticks, tick_s } => {
            simulate::run_simulation(&cfg, ticks, tick_s, shutdown)
        }
        Commands::SelfCheck => self_check(&cfg),
        Commands::Health => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "ok",
                    "service": "fatigue-monitor",
                    "version": env!("CARGO_PKG_VERSION"),
                })
            );
            Ok(())
        }
    }
}

/// Round-trip the store and exercise one engine tick against a synthetic
/// sample, without touching any external collaborator.
fn self_check(cfg: &Config) -> eyre::Result<()> {
    use fatigue_core::types::VisionSample;
    use fatigue_core::{FusionCfg, FusionCore, vision_score};
    use fatigue_traits::Store;

    tracing::info!("self-check starting");

    let store = fatigue_bus::MemoryStore::new(Some(std::time::Duration::from_secs(
        cfg.store.redis_ttl_s,
    )));
    store
        .put("selfcheck", serde_json::json!({"ok": true}))
        .map_err(|e| eyre::eyre!("store put failed: {e}"))?;
    let value = store
        .get("selfcheck")
        .map_err(|e| eyre::eyre!("store get failed: {e}"))?
        .ok_or_else(|| eyre::eyre!("store round-trip lost the record"))?;
    if value["ok"] != true {
        eyre::bail!("store round-trip corrupted the record");
    }

    let sample = VisionSample {
        avg_ear: 0.28,
        mar: 0.1,
        eyes_closed: false,
        closure_duration_s: 0.0,
        microsleep_count: 0,
        blink_rate_per_minute: 15.0,
        yawning: false,
        yawn_count: 0,
        yawn_duration_s: 0.0,
        timestamp_s: 0.0,
    };
    let score = vision_score(&sample);
    let mut fc = FusionCore::new(FusionCfg::default());
    let out = fc
        .fuse(0.0, Some((&sample, &score)), None)
        .map_err(|e| eyre::eyre!("fusion tick failed: {e}"))?;
    if !(0.0..=1.0).contains(&out.fusion_score) {
        eyre::bail!("fusion produced an out-of-range score");
    }

    println!("self-check ok");
    Ok(())
}
