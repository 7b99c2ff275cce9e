//! Boot: logging init, config load, receiver creation.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::ReceiverConfig;
use crate::receiver::{ChannelSink, TcpReceiver};
use crate::record::LogRecord;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "receiver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load and validate config, build the receiver and attach a channel sink.
///
/// Returns the receiver (not yet listening) and the record stream.
pub fn boot() -> Result<(TcpReceiver, UnboundedReceiver<LogRecord>), Box<dyn std::error::Error>> {
    info!("Starting log receiver v{}", env!("CARGO_PKG_VERSION"));

    let config = ReceiverConfig::load()?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    info!(
        "Loaded configuration: port={}, ipv6={}, parser={}",
        config.port,
        config.ipv6,
        config.parser.map_or("auto", |p| p.as_str())
    );

    let receiver = TcpReceiver::new(config)?;
    let (sink, records) = ChannelSink::new();
    receiver.attach(Arc::new(sink));
    info!("Receiver ready: {}", receiver.display_name());

    Ok((receiver, records))
}
