use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::backend::{BackendError, BackendResponse};
use super::domain::{
    IntakeChannel, IntakeOutcome, OutcomeCategory, PersonInfo, RoutedOutcome, SuspensionKind,
};
use crate::notifications::{NotificationJob, NotificationQueue};

/// Message the backend uses to flag a suspended card holder.
pub const SUSPENDED_MESSAGE: &str = "Student is suspended";

impl IntakeOutcome {
    /// Classify a backend reply on `channel`, including transport failures.
    pub fn from_backend(
        channel: IntakeChannel,
        result: Result<BackendResponse, BackendError>,
    ) -> Self {
        match result {
            Ok(response) if response.is_suspension() => {
                let (suspension, until) = match &response.data.suspension {
                    Some(details) => (details.kind, details.end_date),
                    None => (SuspensionKind::Temporary, None),
                };
                IntakeOutcome::Suspended {
                    suspension,
                    until,
                    person: response.data.into_person(),
                }
            }
            Ok(response) if response.succeeded(channel) => IntakeOutcome::Success {
                person: response.data.into_person(),
            },
            Ok(response) => {
                let message = response.data.message;
                if message.as_deref().is_some_and(mentions_already) {
                    IntakeOutcome::AlreadyProcessed { message }
                } else {
                    IntakeOutcome::TransientError { message }
                }
            }
            Err(err) => {
                let message = err.user_message().map(str::to_string);
                if message.as_deref().is_some_and(mentions_already) {
                    IntakeOutcome::AlreadyProcessed { message }
                } else {
                    debug!(%err, "card presentation failed at the backend boundary");
                    IntakeOutcome::TransientError { message }
                }
            }
        }
    }
}

fn mentions_already(message: &str) -> bool {
    message.to_ascii_lowercase().contains("already")
}

/// Hook for screens that show a live summary which should reload after a successful scan.
pub trait SummaryRefresh: Send + Sync {
    fn refresh(&self, channel: IntakeChannel);
}

/// One row of the "just processed" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentEntry {
    #[serde(skip)]
    sequence: u64,
    pub code: String,
    pub display_name: String,
    pub processed_at: DateTime<Utc>,
}

pub fn suspension_message(
    channel: IntakeChannel,
    kind: SuspensionKind,
    until: Option<NaiveDate>,
    person: Option<&PersonInfo>,
) -> String {
    let name = PersonInfo::display_name(person, channel);
    let until = match (kind, until) {
        (SuspensionKind::Temporary, Some(date)) => format!(" until {}", date.format("%b %d, %Y")),
        _ => String::new(),
    };
    format!(
        "{} {} is {} suspended{}.",
        channel.subject(),
        name,
        kind.adverb(),
        until
    )
}

fn success_message(channel: IntakeChannel, person: Option<&PersonInfo>) -> String {
    let name = PersonInfo::display_name(person, channel);
    match channel {
        IntakeChannel::Attendance => format!("Marked attendance for: {name}"),
        IntakeChannel::AssistantLogin => format!("Signed in as {name}"),
    }
}

fn already_processed_fallback(channel: IntakeChannel) -> &'static str {
    match channel {
        IntakeChannel::Attendance => "Attendance was already recorded for this card.",
        IntakeChannel::AssistantLogin => "This card is already signed in.",
    }
}

/// Turns outcomes into operator messages and runs the success side effects.
pub struct OutcomeRouter {
    channel: IntakeChannel,
    display_ttl: Duration,
    recent: Arc<Mutex<Vec<RecentEntry>>>,
    sequence: AtomicU64,
    refresh: Option<Arc<dyn SummaryRefresh>>,
    notifications: Option<NotificationQueue>,
    notify_on_success: bool,
}

impl OutcomeRouter {
    pub fn new(channel: IntakeChannel, display_ttl: Duration) -> Self {
        Self {
            channel,
            display_ttl,
            recent: Arc::new(Mutex::new(Vec::new())),
            sequence: AtomicU64::new(1),
            refresh: None,
            notifications: None,
            notify_on_success: false,
        }
    }

    pub fn with_refresh(mut self, hook: Arc<dyn SummaryRefresh>) -> Self {
        self.refresh = Some(hook);
        self
    }

    pub fn with_notifications(mut self, queue: NotificationQueue, notify_on_success: bool) -> Self {
        self.notifications = Some(queue);
        self.notify_on_success = notify_on_success;
        self
    }

    pub fn recent(&self) -> Vec<RecentEntry> {
        self.recent_entries().clone()
    }

    pub fn route(&self, code: &str, outcome: IntakeOutcome) -> RoutedOutcome {
        let channel = self.channel;
        let message = match &outcome {
            IntakeOutcome::Success { person } => {
                self.on_success(code, person.as_ref());
                success_message(channel, person.as_ref())
            }
            IntakeOutcome::AlreadyProcessed { message } => message
                .clone()
                .unwrap_or_else(|| already_processed_fallback(channel).to_string()),
            IntakeOutcome::Suspended {
                suspension,
                until,
                person,
            } => suspension_message(channel, *suspension, *until, person.as_ref()),
            IntakeOutcome::TransientError { message } => message
                .as_deref()
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .unwrap_or(channel.failure_fallback())
                .to_string(),
        };

        let category = outcome.category();
        match category {
            OutcomeCategory::Success | OutcomeCategory::Info => {
                info!(%channel, code, ?category, %message, "card presentation routed")
            }
            OutcomeCategory::Rejected | OutcomeCategory::Error => {
                warn!(%channel, code, ?category, %message, "card presentation refused")
            }
        }

        RoutedOutcome {
            code: code.to_string(),
            category,
            message,
            outcome,
        }
    }

    fn on_success(&self, code: &str, person: Option<&PersonInfo>) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.recent_entries().push(RecentEntry {
            sequence,
            code: code.to_string(),
            display_name: PersonInfo::display_name(person, self.channel),
            processed_at: Utc::now(),
        });
        self.schedule_removal(sequence);

        if let Some(hook) = &self.refresh {
            hook.refresh(self.channel);
        }

        self.queue_arrival_notice(person);
    }

    fn schedule_removal(&self, sequence: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; processed entry stays on the display list");
            return;
        };

        let recent = Arc::clone(&self.recent);
        let ttl = self.display_ttl;
        runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|entry| entry.sequence != sequence);
        });
    }

    fn queue_arrival_notice(&self, person: Option<&PersonInfo>) {
        if !self.notify_on_success {
            return;
        }
        let (Some(queue), Some(person)) = (&self.notifications, person) else {
            return;
        };
        let Some(contact) = person
            .parent_whatsapp_number
            .as_deref()
            .map(str::trim)
            .filter(|number| !number.is_empty())
        else {
            debug!(channel = %self.channel, "no contact number; arrival notice skipped");
            return;
        };

        let job = NotificationJob::arrival(
            PersonInfo::display_name(Some(person), self.channel),
            contact,
            person.group_code.clone(),
            Local::now().date_naive(),
        );
        if let Err(err) = queue.enqueue(job) {
            warn!(%err, "arrival notice not queued");
        }
    }

    fn recent_entries(&self) -> MutexGuard<'_, Vec<RecentEntry>> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
