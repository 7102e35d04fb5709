use std::time::Duration;
use tokio::time::Instant;

use super::domain::{InputMode, ScanEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter or scan a card code.")]
    EmptyCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSignal {
    /// Keep accumulating.
    Pending,
    /// Scanner mode reached the threshold. The burst completes if
    /// [`InputClassifier::settle`] runs with the same `generation` after a quiet period.
    Settling { generation: u64 },
    /// The burst is a whole card presentation. `burst` is the time from its first to last event.
    Complete { code: String, burst: Duration },
}

/// Decides when the input buffer holds a complete card presentation.
///
/// Emits at most one [`InputSignal::Complete`] per burst. Once emitted, further input is
/// ignored until [`InputClassifier::clear`] runs, so two back-to-back scans never concatenate.
/// Every input and every clear bumps the generation, which invalidates pending settles.
#[derive(Debug)]
pub struct InputClassifier {
    mode: InputMode,
    threshold: usize,
    buffer: String,
    emitted: bool,
    generation: u64,
    burst_started: Option<Instant>,
    last_arrival: Option<Instant>,
}

impl InputClassifier {
    pub fn new(mode: InputMode, threshold: usize) -> Self {
        Self {
            mode,
            threshold: threshold.max(1),
            buffer: String::new(),
            emitted: false,
            generation: 0,
            burst_started: None,
            last_arrival: None,
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switching modes always starts from an empty field.
    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
        self.clear();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// `event.code` replaces the buffer: it is the whole current field value.
    pub fn observe(&mut self, event: ScanEvent) -> InputSignal {
        if self.emitted {
            return InputSignal::Pending;
        }

        self.mark_arrival(event.arrival_time);
        self.buffer = event.code;
        self.check_threshold()
    }

    /// Append one keystroke, as a scanner wedge delivers them.
    pub fn push_char(&mut self, ch: char, arrival_time: Instant) -> InputSignal {
        if self.emitted {
            return InputSignal::Pending;
        }

        self.mark_arrival(arrival_time);
        self.buffer.push(ch);
        self.check_threshold()
    }

    /// Completes a scanner burst once no input arrived since `generation` was handed out.
    pub fn settle(&mut self, generation: u64) -> InputSignal {
        if self.emitted
            || generation != self.generation
            || self.mode != InputMode::Scanner
            || self.trimmed_len() < self.threshold
        {
            return InputSignal::Pending;
        }
        self.emit()
    }

    /// Explicit submit (button press or Enter), honored in either mode.
    pub fn submit(&mut self) -> Result<InputSignal, ValidationError> {
        if self.emitted {
            return Ok(InputSignal::Pending);
        }
        if self.buffer.trim().is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        Ok(self.emit())
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.emitted = false;
        self.generation = self.generation.wrapping_add(1);
        self.burst_started = None;
        self.last_arrival = None;
    }

    fn mark_arrival(&mut self, arrival_time: Instant) {
        if self.buffer.is_empty() {
            self.burst_started = Some(arrival_time);
        }
        self.last_arrival = Some(arrival_time);
        self.generation = self.generation.wrapping_add(1);
    }

    fn check_threshold(&self) -> InputSignal {
        if self.mode == InputMode::Scanner && self.trimmed_len() >= self.threshold {
            return InputSignal::Settling {
                generation: self.generation,
            };
        }
        InputSignal::Pending
    }

    fn trimmed_len(&self) -> usize {
        self.buffer.trim().chars().count()
    }

    fn emit(&mut self) -> InputSignal {
        self.emitted = true;
        let burst = match (self.burst_started, self.last_arrival) {
            (Some(start), Some(last)) => last.saturating_duration_since(start),
            _ => Duration::ZERO,
        };
        InputSignal::Complete {
            code: self.buffer.trim().to_string(),
            burst,
        }
    }
}
