// ehs-gateway: bridges a Samsung EHS heat pump's RS-485/TCP bus to MQTT.
//
// Startup sequence mirrors the teacher's forwarder: init tracing, load
// config, construct the runtime, run until shutdown.

use std::path::PathBuf;

use clap::Parser;
use gateway::config::{self, DEFAULT_CONFIG_PATH};
use gateway::runtime::{Runtime, TraceOptions};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ehs-gateway", version, about = "Samsung EHS heat pump bus-to-MQTT gateway")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Append every raw byte read off the bus to this file.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Replay a previously recorded dump file instead of opening the bus.
    #[arg(long)]
    dry_run: Option<PathBuf>,

    /// Enable debug-level logging regardless of RUST_LOG.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "ehs-gateway starting");

    let cfg = match config::load_config_from_path(&cli.config) {
        Ok(cfg) => {
            info!(
                config_path = %cli.config.display(),
                groups = cfg.polling_groups.len(),
                "config loaded"
            );
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let trace = TraceOptions {
        dump_path: cli.dump.map(|p| p.display().to_string()),
        dry_run_path: cli.dry_run.map(|p| p.display().to_string()),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let runtime = Runtime::with_trace_options(cfg, trace);
    if let Err(e) = runtime.run(shutdown_rx).await {
        error!(error = %e, "ehs-gateway exited with a fatal error");
        // `spec.md` §6/§7: only `ConfigInvalid` escapes to the top as a
        // startup failure (exit 1); a repository load failure is exactly
        // that, just discovered after config parsing succeeds. Exit code 2
        // is reserved for the device-bus transport giving up — which,
        // per the capped-not-exhausted backoff policy in `runtime.rs`,
        // never actually happens: the process stays up without a live bus
        // connection so operators can still observe status (§4.10).
        let code = match e {
            gateway::runtime::RuntimeError::Repository(_) => 1,
            gateway::runtime::RuntimeError::PubSub(_) => 1,
        };
        std::process::exit(code);
    }
}
