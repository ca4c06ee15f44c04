mod handlers;
mod server;

use std::time::Duration;

use clap::{Parser, Subcommand};

use vram_core::config::CoordinatorConfig;
use vram_core::probe::{CapacityProbe, NvidiaSmiProbe};

#[derive(Parser)]
#[command(
    name = "vramd",
    about = "vramd — GPU memory coordinator for co-located model services",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordination HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3200", env = "VRAMD_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "VRAMD_HOST")]
        host: String,

        /// Storage backend: "memory", "json:<path>" or "sqlite:<path>"
        #[arg(long, default_value = "json:vram_registry.json", env = "VRAMD_STORAGE")]
        storage: String,

        /// MiB never handed out to collaborators
        #[arg(long, default_value = "1024", env = "VRAMD_RESERVE_MIB")]
        reserve_mib: u64,

        /// Total MiB assumed when the GPU cannot be queried
        #[arg(long, default_value = "24576", env = "VRAMD_FALLBACK_CAPACITY_MIB")]
        fallback_capacity_mib: u64,

        /// Seconds a lease may sit unused before it is reclaimed
        #[arg(long, default_value = "1800", env = "VRAMD_IDLE_TIMEOUT_SECS")]
        idle_timeout_secs: u64,

        /// Seconds between idle sweeps
        #[arg(long, default_value = "60", env = "VRAMD_RECLAIM_INTERVAL_SECS")]
        reclaim_interval_secs: u64,

        /// Timeout for one eviction callback, in milliseconds
        #[arg(long, default_value = "5000", env = "VRAMD_NOTIFY_TIMEOUT_MS")]
        notify_timeout_ms: u64,

        /// Requests served concurrently
        #[arg(long, default_value = "256", env = "VRAMD_MAX_CONCURRENCY")]
        max_concurrency: usize,
    },

    /// Query the GPU capacity this host reports
    Probe,

    /// Print the capacity status of a running coordinator
    Status {
        /// Base URL of the coordinator
        #[arg(long, default_value = "http://127.0.0.1:3200", env = "VRAMD_URL")]
        url: String,

        /// Bearer token, if the server requires one
        #[arg(long, env = "VRAMD_API_KEY")]
        api_key: Option<String>,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            storage,
            reserve_mib,
            fallback_capacity_mib,
            idle_timeout_secs,
            reclaim_interval_secs,
            notify_timeout_ms,
            max_concurrency,
        } => {
            let config = CoordinatorConfig {
                reserve_mib,
                fallback_capacity_mib,
                idle_timeout: Duration::from_secs(idle_timeout_secs),
                reclaim_interval: Duration::from_secs(reclaim_interval_secs.max(1)),
                notify_timeout: Duration::from_millis(notify_timeout_ms),
            };
            server::run(server::ServeOptions {
                host,
                port,
                storage,
                max_concurrency,
                config,
            })
            .await;
        }
        Commands::Probe => match NvidiaSmiProbe::new().probe() {
            Ok(total) => println!("{} MiB", total),
            Err(e) => {
                eprintln!("Probe failed: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Status { url, api_key } => {
            let endpoint = format!("{}/status", url.trim_end_matches('/'));
            let mut request = ureq::get(&endpoint);
            if let Some(key) = api_key {
                request = request.set("Authorization", &format!("Bearer {}", key));
            }
            let body = request
                .call()
                .map_err(|e| e.to_string())
                .and_then(|resp| {
                    resp.into_json::<serde_json::Value>()
                        .map_err(|e| e.to_string())
                });
            match body {
                Ok(body) => println!(
                    "{}",
                    serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
                ),
                Err(e) => {
                    eprintln!("Could not reach {}: {}", endpoint, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Version => {
            println!("vramd {}", env!("CARGO_PKG_VERSION"));
            println!("GPU memory coordinator for co-located model services");
        }
    }
}
