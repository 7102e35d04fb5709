use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a parent is being contacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationContext {
    DailyAbsence {
        class_name: String,
    },
    MonthlyAbsence {
        class_name: String,
        absent_count: u32,
    },
    PaymentReminder {
        month: u32,
        year: i32,
    },
    /// Sent after a successful attendance scan when the channel opts in.
    Arrival {
        #[serde(default)]
        class_name: Option<String>,
    },
}

impl NotificationContext {
    pub const fn route(&self) -> NotificationRoute {
        match self {
            Self::PaymentReminder { .. } => NotificationRoute::Payment,
            Self::DailyAbsence { .. } | Self::MonthlyAbsence { .. } | Self::Arrival { .. } => {
                NotificationRoute::Attendance
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub target_name: String,
    pub contact_number: String,
    pub context: NotificationContext,
    pub scheduled_date: NaiveDate,
}

impl NotificationJob {
    pub fn daily_absence(
        target_name: impl Into<String>,
        contact_number: impl Into<String>,
        class_name: impl Into<String>,
        scheduled_date: NaiveDate,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            contact_number: contact_number.into(),
            context: NotificationContext::DailyAbsence {
                class_name: class_name.into(),
            },
            scheduled_date,
        }
    }

    pub fn monthly_absence(
        target_name: impl Into<String>,
        contact_number: impl Into<String>,
        class_name: impl Into<String>,
        absent_count: u32,
        scheduled_date: NaiveDate,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            contact_number: contact_number.into(),
            context: NotificationContext::MonthlyAbsence {
                class_name: class_name.into(),
                absent_count,
            },
            scheduled_date,
        }
    }

    pub fn payment_reminder(
        target_name: impl Into<String>,
        contact_number: impl Into<String>,
        month: u32,
        year: i32,
        scheduled_date: NaiveDate,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            contact_number: contact_number.into(),
            context: NotificationContext::PaymentReminder { month, year },
            scheduled_date,
        }
    }

    pub fn arrival(
        target_name: impl Into<String>,
        contact_number: impl Into<String>,
        class_name: Option<String>,
        scheduled_date: NaiveDate,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            contact_number: contact_number.into(),
            context: NotificationContext::Arrival { class_name },
            scheduled_date,
        }
    }

    pub const fn route(&self) -> NotificationRoute {
        self.context.route()
    }
}

/// Bot endpoint a job is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationRoute {
    Attendance,
    Payment,
}

impl NotificationRoute {
    pub const fn ordered() -> [Self; 2] {
        [Self::Attendance, Self::Payment]
    }

    pub const fn path(self) -> &'static str {
        match self {
            Self::Attendance => "/notifications/attendance",
            Self::Payment => "/notifications/payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed { message: String },
}

/// Aggregate result of one call to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub route: NotificationRoute,
    pub jobs: usize,
    pub delivery: DeliveryStatus,
}

impl DispatchReport {
    pub fn delivered(&self) -> bool {
        matches!(self.delivery, DeliveryStatus::Delivered)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub calls: Vec<DispatchReport>,
}

impl BatchReport {
    pub fn all_delivered(&self) -> bool {
        self.calls.iter().all(DispatchReport::delivered)
    }

    pub fn delivered_jobs(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| call.delivered())
            .map(|call| call.jobs)
            .sum()
    }

    pub fn failed_jobs(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| !call.delivered())
            .map(|call| call.jobs)
            .sum()
    }
}
