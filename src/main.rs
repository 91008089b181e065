//! kvresponder - Write, Respond and Delay Orderings over HTTP
//!
//! This is the main entry point for the kvresponder server.
//! It provisions the dataset and transaction executor, builds the router,
//! and serves until Ctrl+C.

use kvresponder::handler::{BusyWait, GreetingHandler};
use kvresponder::http::{build_router, normalize_base_path, serve, AppState};
use kvresponder::storage::{LocalTransactionExecutor, StorageEngine, TxConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Route prefix for every endpoint
    base_path: String,
    /// Outer bound of the busy-wait delay
    delay_outer: u32,
    /// Inner bound of the busy-wait delay
    delay_inner: u32,
    /// Transaction timeout
    tx_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: kvresponder::DEFAULT_HOST.to_string(),
            port: kvresponder::DEFAULT_PORT,
            base_path: String::new(),
            delay_outer: BusyWait::DEFAULT_OUTER,
            delay_inner: BusyWait::DEFAULT_INNER,
            tx_timeout: TxConfig::default().timeout,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = flag_value(&args, i).to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = parse_flag(&args, i, "port number");
                    i += 2;
                }
                "--base-path" => {
                    config.base_path = flag_value(&args, i).to_string();
                    i += 2;
                }
                "--delay-outer" => {
                    config.delay_outer = parse_flag(&args, i, "delay bound");
                    i += 2;
                }
                "--delay-inner" => {
                    config.delay_inner = parse_flag(&args, i, "delay bound");
                    i += 2;
                }
                "--tx-timeout" => {
                    config.tx_timeout = Duration::from_secs(parse_flag(&args, i, "timeout"));
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("kvresponder version {}", kvresponder::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Returns the value following the flag at `i`, or exits.
fn flag_value(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: {} requires a value", args[i]);
            std::process::exit(1);
        }
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], i: usize, what: &str) -> T {
    flag_value(args, i).parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid {}", what);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
kvresponder - Write, Respond and Delay Orderings over HTTP

USAGE:
    kvresponder [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 8080)
        --base-path <PATH>     Prefix for every route (default: none)
        --delay-outer <N>      Outer bound of the busy-wait delay (default: 100)
        --delay-inner <N>      Inner bound of the busy-wait delay (default: 10000000)
        --tx-timeout <SECS>    Transaction timeout in seconds (default: 30)
    -v, --version              Print version information
        --help                 Print this help message

ROUTES:
    GET  readkey/{{key}}
    POST add/predelay/{{key}}/{{value}}
    POST add/postdelay/{{key}}/{{value}}
    POST add/transaction/{{key}}/{{value}}
    GET  info

EXAMPLES:
    $ curl -X POST localhost:8080/add/predelay/alice/Bob
    $ curl localhost:8080/readkey/alice
    Value is Bob!
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("kvresponder v{} starting", kvresponder::VERSION);

    // Provision the dataset and the transaction executor once, for the process lifetime
    let storage = Arc::new(StorageEngine::new());
    info!(dataset = kvresponder::DATASET_NAME, "Dataset created");

    let executor = Arc::new(LocalTransactionExecutor::new(
        storage.clone(),
        TxConfig {
            timeout: config.tx_timeout,
        },
    ));
    info!(timeout = ?executor.config().timeout, "Transaction executor ready");

    let delay = BusyWait::new(config.delay_outer, config.delay_inner);
    info!(iterations = delay.iterations(), "Busy-wait delay configured");

    let handler = GreetingHandler::new(storage.clone(), executor, Arc::new(delay));
    let app = build_router(AppState::new(handler, storage), &config.base_path);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        "Listening on {}{}",
        config.bind_address(),
        normalize_base_path(&config.base_path).unwrap_or_default()
    );

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            return std::future::pending().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    serve(listener, app, shutdown).await?;

    info!("Server shutdown complete");
    Ok(())
}
