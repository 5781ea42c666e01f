//! cmdns client
//!
//! Connects to the measurement service, runs the DNS checks and prints every
//! protocol message on stdout. Diagnostics go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cmdns_agent::probe;
use cmdns_agent::session::{Session, SessionMode, SessionOptions, ShutdownTrigger};
use cmdns_agent::transport;
use cmdns_core::config::{self, parse_check_list, ClientConfig};
use cmdns_core::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "cmdns")]
#[command(about = "cmdns client - measures DNS behaviour from your network")]
#[command(version)]
struct Args {
    /// Measurement service host name or address
    #[arg(short, long)]
    addr: Option<String>,

    /// Measurement service port
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect without TLS
    #[arg(long)]
    no_tls: bool,

    /// Answer lookups with DNS queries to this resolver (ip, ip:port, host or host:port)
    #[arg(short, long)]
    resolver: Option<String>,

    /// Comma-separated check ids to run instead of all checks
    #[arg(long)]
    checks: Option<String>,

    /// List the available checks and exit
    #[arg(long)]
    list: bool,

    /// Exit once the rating has been received
    #[arg(short, long)]
    done: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries the message echo
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;
    config.validate().context("Invalid configuration")?;

    let options = session_options(&args, &config);
    let resolver = probe::build_resolver(&config)
        .await
        .context("Failed to set up lookup probes")?;

    let endpoint = config.endpoint();
    let transport = transport::connect(&endpoint, config.connect_timeout)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;
    tracing::info!("Connected to {}", endpoint);

    let outcome = Session::new(options)
        .with_close_grace(config.close_grace)
        .run(transport, resolver, shutdown_signal())
        .await;

    match (&outcome.trigger, &outcome.report) {
        (ShutdownTrigger::Interrupted, None) => {
            tracing::info!("Interrupted, connection closed");
        }
        (_, Some(report)) => {
            tracing::info!(
                "Session ended ({}): {}/{} checks prepared, checks started: {}, lookups: {} answered, {} dropped",
                report.reason,
                report.prepare_done,
                report.prepare_total,
                report.checks_started,
                report.lookups_forwarded,
                report.lookups_dropped,
            );
        }
        (ShutdownTrigger::Drained, None) => {
            tracing::warn!("Session ended without a report");
        }
    }

    Ok(())
}

/// Defaults, then the config file, then command-line flags
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        // An explicitly named file must load
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let path = config::default_config_path();
            match config::load_config(&path) {
                Ok(config) => config,
                Err(ConfigError::NotFound(_)) => ClientConfig::default(),
                Err(e) => {
                    tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    ClientConfig::default()
                }
            }
        }
    };

    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut ClientConfig, args: &Args) {
    if let Some(addr) = &args.addr {
        config.server = addr.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_tls {
        config.tls = false;
    }
    if let Some(resolver) = &args.resolver {
        config.resolver = Some(resolver.clone());
    }
    if let Some(checks) = &args.checks {
        config.checks = parse_check_list(checks);
    }
    if args.done {
        config.exit_on_rating = true;
    }
}

fn session_options(args: &Args, config: &ClientConfig) -> SessionOptions {
    let mode = if args.list {
        SessionMode::ListOnly
    } else {
        SessionMode::Run {
            checks: config.checks.clone(),
        }
    };
    SessionOptions {
        mode,
        exit_on_rating: config.exit_on_rating,
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_flags_override_config_file() {
        let args = Args::parse_from([
            "cmdns",
            "-a",
            "measure.example.net",
            "-p",
            "8080",
            "--no-tls",
            "-r",
            "192.0.2.53:5353",
            "--checks",
            "c1,c2",
            "-d",
        ]);
        let mut config = ClientConfig {
            server: "from-file.example".into(),
            probe_timeout: Duration::from_secs(3),
            ..ClientConfig::default()
        };

        apply_overrides(&mut config, &args);

        assert_eq!(config.endpoint().url(), "ws://measure.example.net:8080/ws/");
        assert_eq!(config.resolver.as_deref(), Some("192.0.2.53:5353"));
        assert_eq!(config.checks, vec!["c1", "c2"]);
        assert!(config.exit_on_rating);
        // Keys without a flag keep the file's value
        assert_eq!(config.probe_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["cmdns"]);
        let mut config = ClientConfig {
            exit_on_rating: true,
            ..ClientConfig::default()
        };
        apply_overrides(&mut config, &args);
        assert!(config.exit_on_rating);
        assert!(config.tls);
    }

    #[test]
    fn test_list_mode() {
        let args = Args::parse_from(["cmdns", "--list", "--checks", "c1"]);
        let mut config = ClientConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(session_options(&args, &config).mode, SessionMode::ListOnly);

        let args = Args::parse_from(["cmdns", "--checks", "c1"]);
        assert_eq!(
            session_options(&args, &config).mode,
            SessionMode::Run {
                checks: vec!["c1".into()]
            }
        );
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let args = Args::parse_from(["cmdns", "-c", "/nonexistent/cmdns/client.toml"]);
        assert!(load_config(&args).is_err());
    }
}
