use chrono::Local;
use clap::Parser;
use protocolo::{
    cli::Cli,
    config::{load_config, Config},
    info_time,
    logging::init_logging,
    process::process_site,
    registry::CancelRegistry,
    DoneOutcome, EventSink, PortalClient, ProgressEvent, Result,
};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        Config::default()
    };
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, config.logging.json)?;

    let request = cli.site_request(&config);
    let client = PortalClient::new(config.portal.clone())?;

    let registry = CancelRegistry::new();
    let registration = registry.register(None);
    tokio::spawn({
        let registry = registry.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, cancelling");
                registry.cancel_all();
            }
        }
    });

    let events = EventSink::new(256);
    let mut rx = events.subscribe();
    let log_handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ProgressEvent::Progress { percent }) => tracing::debug!(percent, "progress"),
                Ok(ProgressEvent::ConnectivityWarning) => {
                    tracing::warn!("portal not responding, still trying")
                }
                Ok(ProgressEvent::Done { .. }) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "progress lagged"),
            }
        }
    });

    let report = process_site(&client, &request, &events, registration.token()).await;
    drop(registration);
    log_handle.await?;

    match &report.outcome {
        DoneOutcome::Success { record_count } => {
            let path = report
                .export_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!("{record_count} records exported to {path}");
        }
        DoneOutcome::Empty => println!("No records found."),
        DoneOutcome::OutageDetected => println!("The portal appears to be down. Try again later."),
        DoneOutcome::Cancelled => println!("Cancelled."),
        DoneOutcome::Error { message } => println!("Failed: {message}"),
    }
    info_time!(start_time, "Full program time:");

    Ok(())
}
