//! Operational entry point: run the controller against simulated
//! hardware, validate configuration, or run a one-shot self test.

mod cli;
mod run;
mod sim;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("reading config {}", cli.config.display()))?;
    let cfg = irrigator_config::load_toml(&text)
        .wrap_err_with(|| format!("parsing config {}", cli.config.display()))?;
    init_tracing(&cli, &cfg.logging)?;
    cfg.validate().wrap_err("invalid configuration")?;

    match cli.cmd {
        Commands::CheckConfig => {
            if cli.json {
                let line = serde_json::json!({
                    "config": "ok",
                    "channels": cfg.channels.len(),
                    "tick_ms": cfg.scheduler.tick_ms,
                });
                println!("{line}");
            } else {
                println!(
                    "config OK: {} channel(s), tick {} ms",
                    cfg.channels.len(),
                    cfg.scheduler.tick_ms
                );
            }
            Ok(())
        }
        Commands::SelfTest => self_test(&cfg, cli.json),
        Commands::Run { max_ticks } => {
            let mut channels = run::build_channels(&cfg, cli.json)?;
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::Relaxed);
            })
            .wrap_err("installing Ctrl-C handler")?;
            run::run_loop(&cfg, &mut channels, max_ticks, shutdown)
        }
    }
}

fn self_test(cfg: &irrigator_config::Config, json: bool) -> eyre::Result<()> {
    let mut channels = run::build_channels(cfg, json)?;
    for channel in channels.iter_mut() {
        channel.request_self_test();
        channel.tick()?; // enter the test state
        channel.tick()?; // run the diagnostic read
        if json {
            let line = serde_json::json!({
                "channel": channel.id(),
                "self_test": "done",
                "moisture_pct": channel.moisture_pct(),
                "raw": channel.raw_counts(),
                "reservoir_secs": channel.reservoir_secs_remaining(),
            });
            println!("{line}");
        } else {
            println!(
                "{}: self test done, moisture {:.1}% (raw {}), reservoir {:.1}s",
                channel.id(),
                channel.moisture_pct(),
                channel.raw_counts(),
                channel.reservoir_secs_remaining(),
            );
        }
    }
    Ok(())
}

/// Console logging to stderr (pretty or JSON), plus optional JSON file
/// logging from the `[logging]` config table.
fn init_tracing(cli: &Cli, logging: &irrigator_config::Logging) -> eyre::Result<()> {
    let level = logging
        .level
        .clone()
        .unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if cli.json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        );
    }
    if let Some(file) = &logging.file {
        let path = std::path::Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "irrigator.log".into());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        );
    }
    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(())
}
