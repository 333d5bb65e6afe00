use clap::Parser;
use replichat::{try_create_chat_node, ClusterInfo, NodeConfig, NodeOptions};
use slog::Drain;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// One server of the replicated chat cluster.
#[derive(Parser, Debug)]
#[command(name = "replichat", version, about)]
struct Args {
    /// Host to bind the gRPC server on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the gRPC server on.
    #[arg(long, default_value_t = 50051)]
    port: u16,

    /// Initial peer endpoints, excluding self (host:port, comma-separated).
    #[arg(long, value_delimiter = ',')]
    replicas: Vec<String>,

    /// Directory for the store and durable replication state.
    /// Defaults to `replichat-<port>`.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level: debug, info, warning, error or critical.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log level for heartbeat chatter (kept quieter by default).
    #[arg(long, default_value = "warning")]
    heartbeat_log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let (log_level, heartbeat_log_level) =
        match (parse_level(&args.log_level), parse_level(&args.heartbeat_log_level)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                eprintln!("unknown log level; expected debug|info|warning|error|critical");
                return ExitCode::FAILURE;
            }
        };

    let my_endpoint = format!("{}:{}", args.host, args.port);
    let (logger, heartbeat_logger) = create_loggers(&my_endpoint, log_level, heartbeat_log_level);

    let config = NodeConfig {
        cluster: ClusterInfo {
            my_endpoint: my_endpoint.clone(),
            peer_endpoints: args.replicas,
        },
        data_dir: args
            .data_dir
            .unwrap_or_else(|| PathBuf::from(format!("replichat-{}", args.port))),
        logger: logger.clone(),
        heartbeat_logger,
        options: NodeOptions::default(),
    };

    let node = match try_create_chat_node(config).await {
        Ok(node) => node,
        Err(e) => {
            slog::crit!(logger, "Fatal startup error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    slog::info!(logger, "Node {} is up", node.server_id());

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            slog::info!(logger, "Shutting down");
            drop(node);
            ExitCode::SUCCESS
        }
        Err(e) => {
            slog::crit!(logger, "Failed to wait for shutdown signal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_level(name: &str) -> Option<slog::Level> {
    match name.to_ascii_lowercase().as_str() {
        "debug" => Some(slog::Level::Debug),
        "info" => Some(slog::Level::Info),
        "warning" | "warn" => Some(slog::Level::Warning),
        "error" => Some(slog::Level::Error),
        "critical" | "crit" => Some(slog::Level::Critical),
        _ => None,
    }
}

/// One shared async terminal drain, filtered twice: the server logger and
/// the (usually quieter) heartbeat logger.
fn create_loggers(
    endpoint: &str,
    log_level: slog::Level,
    heartbeat_log_level: slog::Level,
) -> (slog::Logger, slog::Logger) {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = Arc::new(slog_async::Async::new(drain).build().fuse());

    let logger = slog::Logger::root(
        Arc::clone(&drain).filter_level(log_level).fuse(),
        slog::o!("server" => endpoint.to_string()),
    );
    let heartbeat_logger = slog::Logger::root(
        drain.filter_level(heartbeat_log_level).fuse(),
        slog::o!("server" => endpoint.to_string(), "component" => "heartbeat"),
    );
    (logger, heartbeat_logger)
}
