use std::time::Duration;

use super::domain::{InputMode, IntakeChannel};

pub(crate) const DEFAULT_WINDOW: Duration = Duration::from_millis(5_000);
pub(crate) const DEFAULT_GATE_COOLDOWN: Duration = Duration::from_millis(200);
pub(crate) const DEFAULT_SCAN_LENGTH_THRESHOLD: usize = 6;
pub(crate) const DEFAULT_SCAN_SETTLE: Duration = Duration::from_millis(500);
pub(crate) const DEFAULT_DISPLAY_TTL: Duration = Duration::from_millis(5_000);

/// Per-channel tuning for one intake coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSettings {
    pub mode: InputMode,
    /// How long a successfully processed code is refused.
    pub window: Duration,
    pub gate_cooldown: Duration,
    /// Scanner-mode buffers of at least this many characters are complete.
    pub scan_length_threshold: usize,
    /// Quiet period after the threshold before a scanner burst counts as complete.
    pub scan_settle: Duration,
    /// How long a processed card stays on the "just processed" list.
    pub display_ttl: Duration,
    pub notify_on_success: bool,
}

impl IntakeSettings {
    pub fn for_channel(channel: IntakeChannel) -> Self {
        Self {
            mode: channel.default_mode(),
            window: DEFAULT_WINDOW,
            gate_cooldown: DEFAULT_GATE_COOLDOWN,
            scan_length_threshold: DEFAULT_SCAN_LENGTH_THRESHOLD,
            scan_settle: DEFAULT_SCAN_SETTLE,
            display_ttl: DEFAULT_DISPLAY_TTL,
            notify_on_success: false,
        }
    }

    pub fn with_mode(mut self, mode: InputMode) -> Self {
        self.mode = mode;
        self
    }
}
