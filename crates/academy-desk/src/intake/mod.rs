//! Card-presentation intake shared by attendance scanning and assistant card login.
//!
//! A presentation flows through the [`InputClassifier`], the [`DedupWindow`], the
//! [`SingleFlightGate`] and the backend before the [`OutcomeRouter`] turns the response into
//! a short operator message. [`IntakeCoordinator`] owns all of that state.

mod backend;
mod classifier;
mod clock;
mod coordinator;
pub mod domain;
mod dedup;
mod gate;
mod outcome;
mod settings;

#[cfg(test)]
mod tests;

pub use backend::{BackendData, BackendError, BackendResponse, HttpIntakeBackend, IntakeBackend};
pub use classifier::{InputClassifier, InputSignal, ValidationError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{InputAck, IntakeCoordinator, IntakePhase, IntakeSnapshot};
pub use dedup::{DedupEntry, DedupWindow};
pub use domain::{
    InputMode, IntakeChannel, IntakeOutcome, IntakeReport, OutcomeCategory, PersonInfo,
    RoutedOutcome, ScanEvent, SuspensionDetails, SuspensionKind,
};
pub use gate::{PendingSubmission, SingleFlightGate};
pub use outcome::{OutcomeRouter, RecentEntry, SummaryRefresh, SUSPENDED_MESSAGE};
pub use settings::IntakeSettings;
