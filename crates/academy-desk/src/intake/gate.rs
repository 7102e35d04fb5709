use std::time::Duration;
use tokio::time::Instant;

/// The one submission currently waiting on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub code: String,
    pub submitted_at: Instant,
}

/// Non-blocking single-flight latch with a post-release cooldown.
///
/// A refused [`SingleFlightGate::try_acquire`] is final: callers drop the attempt rather than
/// wait for the gate.
#[derive(Debug)]
pub struct SingleFlightGate {
    cooldown: Duration,
    pending: Option<PendingSubmission>,
    reopens_at: Option<Instant>,
    acquisitions: u64,
    releases: u64,
}

impl SingleFlightGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            pending: None,
            reopens_at: None,
            acquisitions: 0,
            releases: 0,
        }
    }

    pub fn try_acquire(&mut self, code: &str, now: Instant) -> bool {
        if self.pending.is_some() || self.is_cooling_down(now) {
            return false;
        }

        self.pending = Some(PendingSubmission {
            code: code.to_string(),
            submitted_at: now,
        });
        self.reopens_at = None;
        self.acquisitions += 1;
        true
    }

    /// Release the gate and start the cooldown. Releasing a free gate does nothing.
    pub fn release(&mut self, now: Instant) -> Option<PendingSubmission> {
        let pending = self.pending.take()?;
        self.releases += 1;
        self.reopens_at = Some(now + self.cooldown);
        Some(pending)
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.reopens_at.is_some_and(|reopens_at| now < reopens_at)
    }

    pub fn pending(&self) -> Option<&PendingSubmission> {
        self.pending.as_ref()
    }

    pub fn held_count(&self) -> usize {
        usize::from(self.pending.is_some())
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions
    }

    pub fn releases(&self) -> u64 {
        self.releases
    }
}
