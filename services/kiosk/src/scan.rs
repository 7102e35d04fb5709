use crate::cli::ScanArgs;
use crate::infra::KioskState;
use academy_desk::config::AppConfig;
use academy_desk::error::AppError;
use academy_desk::intake::{HttpIntakeBackend, IntakeReport};
use academy_desk::notifications::{HttpNotificationTransport, NotificationDispatcher};
use academy_desk::telemetry::{self, LogSink};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Treat each stdin line as the final field value of one card presentation. The line end
/// submits it, so scanner mode never waits out the settle delay here.
pub(crate) async fn run(args: ScanArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_sink(&config.telemetry, LogSink::Stderr)?;

    let backend = Arc::new(HttpIntakeBackend::new(
        config.backend.base_url.clone(),
        config.backend.token.clone(),
        config.backend.timeout,
    )?);
    let transport = Arc::new(HttpNotificationTransport::new(
        config.notifications.base_url.clone(),
        config.backend.timeout,
    )?);
    let dispatcher = NotificationDispatcher::new(transport);
    let (queue, worker) = dispatcher.spawn_queue(config.notifications.max_batch);

    let kiosk = KioskState::build(&config, backend, dispatcher, queue);
    let coordinator = kiosk.channel(args.channel);
    if let Some(mode) = args.mode {
        coordinator.set_mode(mode);
    }
    info!(
        channel = %args.channel,
        mode = coordinator.snapshot().mode.label(),
        "reading card presentations from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        coordinator.observe_input(line);
        let report = coordinator.submit_buffer().await;
        stdout.write_all(render(&report).as_bytes()).await?;
        stdout.flush().await?;
    }

    drop(kiosk);
    if let Err(err) = worker.await {
        warn!(%err, "notification worker ended abnormally");
    }
    Ok(())
}

fn render(report: &IntakeReport) -> String {
    match report {
        IntakeReport::Routed(routed) => {
            format!("[{:?}] {}: {}\n", routed.category, routed.code, routed.message)
        }
        IntakeReport::Dropped { code } => format!("[Dropped] {code}: another card is in flight\n"),
        IntakeReport::Duplicate { code, message } => format!("[Duplicate] {code}: {message}\n"),
        IntakeReport::Invalid { message } => format!("[Invalid] {message}\n"),
    }
}
