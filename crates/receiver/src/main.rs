use receiver::record::LogRecord;
use receiver::runtime::{boot, stop};
use tracing::{info, warn};

fn print_record(record: &LogRecord) {
    match serde_json::to_string(record) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to render record: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let (receiver, mut records) = boot::boot()?;

    let printer = tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            print_record(&record);
        }
    });

    info!("Client configuration:\n{}", receiver.sample_client_config());
    let addr = receiver.initialize()?;
    info!("Waiting for a client on {}", addr);

    stop::shutdown_signal().await;
    receiver.terminate().await;
    receiver.detach();

    if let Err(e) = printer.await {
        warn!("Record printer ended abnormally: {}", e);
    }
    info!("Final metrics: {}", serde_json::to_string(&receiver.metrics())?);
    Ok(())
}
