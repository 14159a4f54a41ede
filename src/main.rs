//! Classwatch - live style-class registry
//!
//! Entry point: `serve` runs the registry builder and broadcast server,
//! `check` runs a relay and a display agent over a rendered page.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use classwatch::display::{DisplayAgent, HtmlSurface, StatusReport};
use classwatch::registry::BuilderService;
use classwatch::relay::RelayAgent;
use classwatch::server::{init_metrics, init_tracing, shutdown_signal, App, BroadcastHub, ServerConfig};
use classwatch::{Config, Error, Result};

/// Classwatch - live style-class registry
#[derive(Parser, Debug)]
#[command(name = "classwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host address to bind to, or to connect to when checking
    #[arg(long, env = "CLASSWATCH_HOST", default_value = "127.0.0.1", global = true)]
    host: String,

    /// Broadcast port
    #[arg(short, long, env = "CLASSWATCH_PORT", default_value = "8765", global = true)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CLASSWATCH_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "CLASSWATCH_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan source directories and broadcast the registry on every change
    Serve {
        /// Directories to scan
        #[arg(
            short = 'd',
            long = "scan-dir",
            env = "CLASSWATCH_SCAN_DIRS",
            value_delimiter = ',',
            default_values = ["./src/content-scripts", "./src/components"]
        )]
        scan_dirs: Vec<PathBuf>,

        /// File extensions to scan
        #[arg(
            short = 'e',
            long = "ext",
            env = "CLASSWATCH_EXTENSIONS",
            value_delimiter = ',',
            default_value = "tsx"
        )]
        extensions: Vec<String>,

        /// Debounce window for file events, in milliseconds
        #[arg(long, env = "CLASSWATCH_DEBOUNCE_MS", default_value = "200")]
        debounce_ms: u64,
    },

    /// Validate a rendered HTML page against the live registry
    Check {
        /// Page to inspect
        #[arg(long)]
        page: PathBuf,

        /// Broadcast endpoint; defaults to ws://<host>:<port>/
        #[arg(long, env = "CLASSWATCH_SERVER")]
        server: Option<String>,

        /// Wait between reconnect attempts, in milliseconds
        #[arg(long, env = "CLASSWATCH_RECONNECT_DELAY_MS", default_value = "3000")]
        reconnect_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json)?;

    tracing::info!("Classwatch v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config {
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
        log_json: cli.log_json,
        ..Config::default()
    };

    match cli.command {
        Command::Serve {
            scan_dirs,
            extensions,
            debounce_ms,
        } => {
            config.scan_dirs = scan_dirs;
            config.extensions = extensions;
            config.debounce_ms = debounce_ms;
            config.validate()?;
            tracing::debug!(?config, "Configuration loaded");
            serve(config).await
        }
        Command::Check {
            page,
            server,
            reconnect_delay_ms,
        } => {
            config.reconnect_delay_ms = reconnect_delay_ms;
            config.validate()?;
            tracing::debug!(?config, "Configuration loaded");
            check(&config, page, server).await
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    init_metrics();

    tracing::info!(
        "Broadcasting on ws://{}, scanning {:?}",
        config.server_addr(),
        config.scan_dirs
    );

    let hub = Arc::new(BroadcastHub::new());
    let shutdown = CancellationToken::new();

    let service = BuilderService::new(&config, Arc::clone(&hub));
    let builder = tokio::spawn(service.run(shutdown.clone()));

    let server_config = ServerConfig {
        host: config.host,
        port: config.port,
    };
    let server = tokio::spawn(App::new(server_config, hub).run(shutdown.clone()));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let (server, builder) = tokio::join!(
        supervise("server", server, shutdown.clone()),
        supervise("builder", builder, shutdown),
    );
    server?;
    builder?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for `task`; whichever half stops first takes the other down with it.
async fn supervise(
    name: &str,
    task: JoinHandle<Result<()>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let result = task
        .await
        .map_err(|e| Error::internal(format!("{name} task failed: {e}")))
        .and_then(|result| result);
    shutdown.cancel();
    result
}

async fn check(config: &Config, page: PathBuf, server: Option<String>) -> Result<()> {
    let url = server.unwrap_or_else(|| config.server_url());
    let relay = RelayAgent::new(url, config.reconnect_delay());
    let shutdown = CancellationToken::new();

    let relay_task = tokio::spawn({
        let relay = relay.clone();
        let shutdown = shutdown.clone();
        async move { relay.run(shutdown).await }
    });

    let agent = DisplayAgent::new(Arc::new(HtmlSurface::new(page)), relay);
    agent.init().await?;
    let mut updates = agent.watch();
    println!("{}\n", agent.status());

    let signal = shutdown_signal();
    tokio::pin!(signal);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            () = &mut signal => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = Arc::clone(&updates.borrow_and_update());
                if !state.checking {
                    println!("{}\n", StatusReport::from_state(&state));
                }
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(command) => match command.trim() {
                    "r" => {
                        if let Err(e) = agent.refresh().await {
                            tracing::warn!(error = %e, "Refresh failed");
                        }
                    }
                    "v" => {
                        agent.toggle_visibility();
                    }
                    "q" => break,
                    "" => {}
                    other => eprintln!("unknown command '{other}' (r = refresh, v = toggle details, q = quit)"),
                },
                None => stdin_open = false,
            },
        }
    }

    agent.dispose();
    shutdown.cancel();
    if let Err(e) = relay_task.await {
        tracing::warn!(error = %e, "Relay task ended abnormally");
    }
    Ok(())
}
