use academy_desk::config::AppConfig;
use academy_desk::error::AppError;
use academy_desk::intake::{
    InputMode, IntakeBackend, IntakeChannel, IntakeCoordinator, SummaryRefresh,
};
use academy_desk::notifications::{NotificationDispatcher, NotificationQueue, NotificationTransport};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Bumped on every successful attendance scan; the board polls it to know when the
/// daily summary is stale.
#[derive(Debug, Default)]
pub(crate) struct SummaryGeneration {
    generation: AtomicU64,
}

impl SummaryGeneration {
    pub(crate) fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl SummaryRefresh for SummaryGeneration {
    fn refresh(&self, channel: IntakeChannel) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(%channel, generation, "summary marked stale");
    }
}

/// Both intake channels plus the notification dispatcher, shared by every handler.
pub(crate) struct KioskState<B, T> {
    pub(crate) attendance: Arc<IntakeCoordinator<B>>,
    pub(crate) assistant_login: Arc<IntakeCoordinator<B>>,
    pub(crate) notifications: NotificationDispatcher<T>,
    pub(crate) summary: Arc<SummaryGeneration>,
}

impl<B, T> KioskState<B, T>
where
    B: IntakeBackend + 'static,
    T: NotificationTransport + 'static,
{
    /// Wire both coordinators from configuration. Attendance drives the summary refresh.
    pub(crate) fn build(
        config: &AppConfig,
        backend: Arc<B>,
        notifications: NotificationDispatcher<T>,
        queue: NotificationQueue,
    ) -> Self {
        let summary = Arc::new(SummaryGeneration::default());

        let settings = config.intake.settings_for(IntakeChannel::Attendance);
        let attendance = IntakeCoordinator::new(IntakeChannel::Attendance, Arc::clone(&backend), settings)
            .with_refresh(summary.clone())
            .with_notifications(queue.clone(), settings.notify_on_success);

        let settings = config.intake.settings_for(IntakeChannel::AssistantLogin);
        let assistant_login = IntakeCoordinator::new(IntakeChannel::AssistantLogin, backend, settings)
            .with_notifications(queue, settings.notify_on_success);

        Self {
            attendance: Arc::new(attendance),
            assistant_login: Arc::new(assistant_login),
            notifications,
            summary,
        }
    }

    pub(crate) fn channel(&self, channel: IntakeChannel) -> &Arc<IntakeCoordinator<B>> {
        match channel {
            IntakeChannel::Attendance => &self.attendance,
            IntakeChannel::AssistantLogin => &self.assistant_login,
        }
    }

    pub(crate) fn coordinator(&self, raw: &str) -> Result<&Arc<IntakeCoordinator<B>>, AppError> {
        let channel = raw
            .parse::<IntakeChannel>()
            .map_err(|_| AppError::UnknownChannel(raw.to_string()))?;
        Ok(self.channel(channel))
    }
}

pub(crate) fn parse_channel(raw: &str) -> Result<IntakeChannel, String> {
    raw.parse()
}

pub(crate) fn parse_mode(raw: &str) -> Result<InputMode, String> {
    raw.parse()
}
