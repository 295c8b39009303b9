//! TinyWins agent mesh: entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Resolve bus credentials and connect the session (fatal on failure)
//!   6. Build agents and the dispatcher, subscribe to their topic kinds
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Spawn the dispatch loop
//!   9. Local transport: run the console until EOF or Ctrl-C
//!  10. Cancel token, drain compose tasks, close the session

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tinywins_mesh::agents::{AnalyticsAgent, ContentAgent, PlannerAgent};
use tinywins_mesh::bus::transport::{Connector, LocalBroker};
use tinywins_mesh::bus::{BusBuffers, BusSession};
use tinywins_mesh::compose::providers;
use tinywins_mesh::config::{self, BusCredentials, Config, TransportKind};
use tinywins_mesh::dispatch::{self, Agent, Dispatcher};
use tinywins_mesh::error::AppError;
use tinywins_mesh::topics::subscription_for;
use tinywins_mesh::{console, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let mut config = config::load(args.config_path.as_deref())?;
    if args.local {
        config.bus.transport = TransportKind::Local;
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        transport = ?config.bus.transport,
        compose_provider = %config.content.provider,
        "config loaded"
    );

    let (connector, credentials) = resolve_bus(&config)?;
    let buffers = BusBuffers {
        inbound: config.bus.inbound_buffer,
        outbound: config.bus.outbound_buffer,
    };
    let mut session = BusSession::connect(connector.clone(), &credentials, buffers).await?;

    let provider = providers::build(&config.content).map_err(|e| AppError::Config(e.to_string()))?;
    let content = Arc::new(ContentAgent::new(
        session.handle(),
        provider,
        Duration::from_secs(config.content.timeout_seconds),
    ));
    let agents: Vec<Arc<dyn Agent>> = vec![
        Arc::new(PlannerAgent),
        content.clone(),
        Arc::new(AnalyticsAgent::new(session.handle())),
    ];
    let dispatcher = Arc::new(Dispatcher::new(agents));

    for kind in dispatcher.kinds() {
        session.subscribe(&subscription_for(kind)).await?;
    }
    let inbound = session
        .take_inbound()
        .ok_or_else(|| AppError::Config("inbound queue already taken".into()))?;

    // Shared shutdown token. Ctrl-C cancels it, all tasks watch it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let dispatch_token = shutdown.clone();
    let dispatch_dispatcher = dispatcher.clone();
    let dispatch_handle = tokio::spawn(async move {
        dispatch::run(&dispatch_dispatcher, inbound, dispatch_token).await;
    });

    print_startup_summary(&config, &credentials, &session);

    if config.bus.transport == TransportKind::Local {
        let console_session = BusSession::connect(connector, &credentials, buffers).await?;
        let stdin = BufReader::new(tokio::io::stdin());
        console::run(console_session, stdin, shutdown.clone()).await?;
        // Console exited on EOF; stop everything else too.
        shutdown.cancel();
    }

    dispatch_handle.await.ok();
    content.shutdown().await;
    session.close().await;

    let _ = { use std::io::Write as _; std::io::stderr().flush() };
    Ok(())
}

/// Pick the transport and its login. The local broker needs no environment;
/// every other transport requires the full `MESH_BUS_*` set.
fn resolve_bus(config: &Config) -> Result<(Connector, BusCredentials), AppError> {
    match config.bus.transport {
        TransportKind::Local => {
            let credentials = BusCredentials {
                host: "local".into(),
                tenant: "local".into(),
                username: "mesh".into(),
                password: "mesh".into(),
            };
            let broker = LocalBroker::new(credentials.username.clone(), credentials.password.clone());
            Ok((Connector::Local(broker), credentials))
        }
        #[cfg(feature = "transport-nats")]
        TransportKind::Nats => Ok((Connector::Nats, config::bus_credentials()?)),
        #[cfg(not(feature = "transport-nats"))]
        TransportKind::Nats => Err(AppError::Config(
            "nats transport requested but the `transport-nats` feature is disabled".into(),
        )),
    }
}

fn print_startup_summary(config: &Config, credentials: &BusCredentials, session: &BusSession) {
    let subscriptions = session.subscriptions().collect::<Vec<_>>().join(", ");
    println!("✓ Mesh up (pid {})", std::process::id());
    println!("  bus:     {:?} {} tenant={}", config.bus.transport, credentials.host, credentials.tenant);
    println!("  topics:  {subscriptions}");
    println!(
        "  compose: {} {} timeout={}s",
        config.content.provider, config.content.compose_url, config.content.timeout_seconds
    );
}

struct CliArgs {
    log_level: Option<&'static str>,
    local: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut local = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: tinywins-mesh [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("      --local                Use the in-process broker and attach the stdin console");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "--local" => local = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // Each -v raises verbosity one tier:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug  (dispatch, subscriptions, compose calls)
    //   -vvvv+  → trace  (broker delivery)
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, local, config_path }
}
