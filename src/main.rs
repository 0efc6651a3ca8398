//! Gateway entry point.
//!
//! Initializes logging, loads configuration, opens the tool store and starts
//! the configured transport.

use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use tool_gateway::core::{Config, Gateway, TransportService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    init_logging(&config.logging.level, config.logging.with_timestamps);

    info!("Starting {} v{}", config.server.name, config.server.version);

    let gateway = Gateway::open(config.clone()).await?;

    info!("Gateway initialized");

    let transport = TransportService::new(config.transport);
    transport.run(gateway).await?;

    info!("Gateway shutting down");

    Ok(())
}

/// Initialize the logging subsystem.
///
/// Output goes to stderr so the STDIO transport keeps stdout for protocol
/// messages.
fn init_logging(level: &str, with_timestamps: bool) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if with_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}
