use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use super::backend::IntakeBackend;
use super::classifier::{InputClassifier, InputSignal, ValidationError};
use super::clock::{Clock, SystemClock};
use super::dedup::DedupWindow;
use super::domain::{InputMode, IntakeChannel, IntakeOutcome, IntakeReport, ScanEvent};
use super::gate::SingleFlightGate;
use super::outcome::{OutcomeRouter, RecentEntry, SummaryRefresh};
use super::settings::IntakeSettings;
use crate::notifications::NotificationQueue;

const DUPLICATE_MESSAGE: &str = "This card was already scanned recently.";

/// Phase of the gate holder's submission. Runs strictly forward and always ends back at `Idle`.
///
/// Validation and the dedup check run under the state lock before the gate is taken, so they
/// never show up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakePhase {
    Idle,
    Submitting,
    Dispatching,
}

/// Returned for every observed input; reports from a settled scan land in
/// [`IntakeSnapshot::last_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputAck {
    pub buffer_len: usize,
    /// A scanner burst reached the threshold and completes if the field stays quiet.
    pub settling: bool,
}

struct IntakeState {
    phase: IntakePhase,
    classifier: InputClassifier,
    dedup: DedupWindow,
    gate: SingleFlightGate,
    last_report: Option<IntakeReport>,
}

impl IntakeState {
    fn enter(&mut self, channel: IntakeChannel, phase: IntakePhase) {
        debug!(%channel, from = ?self.phase, to = ?phase, "intake phase");
        self.phase = phase;
    }
}

/// Read-only view for the display board.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeSnapshot {
    pub channel: IntakeChannel,
    pub mode: InputMode,
    pub phase: IntakePhase,
    pub buffer_len: usize,
    pub in_flight: Option<String>,
    pub gate_held: usize,
    pub gate_acquisitions: u64,
    pub gate_releases: u64,
    pub dedup_entries: usize,
    pub recent: Vec<RecentEntry>,
    pub last_report: Option<IntakeReport>,
}

/// Owns the classifier, dedup window and single-flight gate for one intake channel.
///
/// Shared as `Arc<IntakeCoordinator<_>>`. The state lock is never held across the backend
/// call, which is the only suspension point of a submission.
pub struct IntakeCoordinator<B> {
    channel: IntakeChannel,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    scan_settle: Duration,
    router: OutcomeRouter,
    state: Mutex<IntakeState>,
}

impl<B> IntakeCoordinator<B>
where
    B: IntakeBackend + 'static,
{
    pub fn new(channel: IntakeChannel, backend: Arc<B>, settings: &IntakeSettings) -> Self {
        Self::with_clock(channel, backend, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        channel: IntakeChannel,
        backend: Arc<B>,
        settings: &IntakeSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = IntakeState {
            phase: IntakePhase::Idle,
            classifier: InputClassifier::new(settings.mode, settings.scan_length_threshold),
            dedup: DedupWindow::new(settings.window),
            gate: SingleFlightGate::new(settings.gate_cooldown),
            last_report: None,
        };

        Self {
            channel,
            backend,
            clock,
            scan_settle: settings.scan_settle,
            router: OutcomeRouter::new(channel, settings.display_ttl),
            state: Mutex::new(state),
        }
    }

    pub fn with_refresh(mut self, hook: Arc<dyn SummaryRefresh>) -> Self {
        self.router = self.router.with_refresh(hook);
        self
    }

    pub fn with_notifications(mut self, queue: NotificationQueue, notify_on_success: bool) -> Self {
        self.router = self.router.with_notifications(queue, notify_on_success);
        self
    }

    pub fn channel(&self) -> IntakeChannel {
        self.channel
    }

    pub fn set_mode(&self, mode: InputMode) {
        self.state().classifier.set_mode(mode);
        info!(channel = %self.channel, mode = mode.label(), "input mode changed");
    }

    /// Feed the current field value. A scanner burst that reaches the threshold is submitted
    /// once the field has been quiet for the settle delay.
    pub fn observe_input(self: &Arc<Self>, value: impl Into<String>) -> InputAck {
        let event = ScanEvent::new(value, self.clock.now());
        let mut state = self.state();
        let signal = state.classifier.observe(event);
        self.acknowledge(&state, signal)
    }

    /// Single-keystroke variant of [`Self::observe_input`].
    pub fn observe_keystroke(self: &Arc<Self>, ch: char) -> InputAck {
        let now = self.clock.now();
        let mut state = self.state();
        let signal = state.classifier.push_char(ch, now);
        self.acknowledge(&state, signal)
    }

    fn acknowledge(self: &Arc<Self>, state: &IntakeState, signal: InputSignal) -> InputAck {
        let settling = match signal {
            InputSignal::Settling { generation } => {
                self.schedule_settle(generation);
                true
            }
            _ => false,
        };
        InputAck {
            buffer_len: state.classifier.buffer().chars().count(),
            settling,
        }
    }

    fn schedule_settle(self: &Arc<Self>, generation: u64) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.scan_settle).await;
            let signal = coordinator.state().classifier.settle(generation);
            if let InputSignal::Complete { code, burst } = signal {
                debug!(
                    channel = %coordinator.channel,
                    burst_ms = burst.as_millis() as u64,
                    "input burst complete"
                );
                coordinator.submit(&code).await;
            }
        });
    }

    /// Explicit submit of whatever is in the field.
    pub async fn submit_buffer(&self) -> IntakeReport {
        let signal = {
            let mut state = self.state();
            let signal = state.classifier.submit();
            if signal.is_err() {
                state.classifier.clear();
            }
            signal
        };

        match signal {
            Ok(InputSignal::Complete { code, .. }) => self.submit(&code).await,
            Ok(InputSignal::Pending | InputSignal::Settling { .. }) => {
                let code = self.state().classifier.buffer().trim().to_string();
                debug!(channel = %self.channel, %code, "burst already submitted");
                IntakeReport::Dropped { code }
            }
            Err(err) => IntakeReport::Invalid {
                message: err.to_string(),
            },
        }
    }

    /// Run one card presentation through validation, dedup, the gate and the backend.
    pub async fn submit(&self, code: &str) -> IntakeReport {
        let report = self.process(code.trim()).await;
        self.state().last_report = Some(report.clone());
        report
    }

    async fn process(&self, code: &str) -> IntakeReport {
        let now = self.clock.now();

        let permit = {
            let mut state = self.state();

            if code.is_empty() {
                state.classifier.clear();
                return IntakeReport::Invalid {
                    message: ValidationError::EmptyCode.to_string(),
                };
            }

            state.dedup.evict_expired(now);
            if state.dedup.is_duplicate(code, now) {
                state.classifier.clear();
                info!(channel = %self.channel, code, "duplicate card presentation ignored");
                return IntakeReport::Duplicate {
                    code: code.to_string(),
                    message: DUPLICATE_MESSAGE.to_string(),
                };
            }

            if !state.gate.try_acquire(code, now) {
                state.classifier.clear();
                debug!(channel = %self.channel, code, "gate busy; card presentation dropped");
                return IntakeReport::Dropped {
                    code: code.to_string(),
                };
            }

            state.enter(self.channel, IntakePhase::Submitting);
            GatePermit { coordinator: self }
        };

        let result = self
            .backend
            .submit_card_presentation(self.channel, code)
            .await;

        let outcome = IntakeOutcome::from_backend(self.channel, result);
        {
            let mut state = self.state();
            state.enter(self.channel, IntakePhase::Dispatching);
            if outcome.is_success() {
                state.dedup.record(code, self.clock.now());
            }
        }
        drop(permit);

        IntakeReport::Routed(self.router.route(code, outcome))
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        let now = self.clock.now();
        let state = self.state();
        IntakeSnapshot {
            channel: self.channel,
            mode: state.classifier.mode(),
            phase: state.phase,
            buffer_len: state.classifier.buffer().chars().count(),
            in_flight: state.gate.pending().map(|pending| pending.code.clone()),
            gate_held: state.gate.held_count(),
            gate_acquisitions: state.gate.acquisitions(),
            gate_releases: state.gate.releases(),
            dedup_entries: state.dedup.live_len(now),
            recent: self.router.recent(),
            last_report: state.last_report.clone(),
        }
    }

    pub fn is_recently_accepted(&self, code: &str) -> bool {
        let now = self.clock.now();
        self.state().dedup.is_duplicate(code.trim(), now)
    }

    fn state(&self) -> MutexGuard<'_, IntakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of one backend call. Dropping it releases the gate, clears the
/// input field and returns to `Idle`, whether the call finished, failed or was cancelled.
struct GatePermit<'a, B>
where
    B: IntakeBackend + 'static,
{
    coordinator: &'a IntakeCoordinator<B>,
}

impl<B> Drop for GatePermit<'_, B>
where
    B: IntakeBackend + 'static,
{
    fn drop(&mut self) {
        let now = self.coordinator.clock.now();
        let mut state = self.coordinator.state();
        state.gate.release(now);
        state.classifier.clear();
        state.enter(self.coordinator.channel, IntakePhase::Idle);
    }
}
