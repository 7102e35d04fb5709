use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::domain::{NotificationContext, NotificationJob, NotificationRoute};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification bot rejected the batch ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("notification bot unreachable: {0}")]
    Transport(String),
    #[error("notification queue is closed")]
    QueueClosed,
}

/// Delivers one batch of same-route jobs in a single call.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(
        &self,
        route: NotificationRoute,
        jobs: &[NotificationJob],
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceNotice<'a> {
    student_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<&'a str>,
    parent_number: &'a str,
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    absent_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentNotice<'a> {
    student_name: &'a str,
    month: u32,
    year: i32,
    parent_number: &'a str,
}

#[derive(Debug, Serialize)]
struct AttendanceBatch<'a> {
    students: Vec<AttendanceNotice<'a>>,
}

#[derive(Debug, Serialize)]
struct PaymentBatch<'a> {
    reminders: Vec<PaymentNotice<'a>>,
}

fn attendance_notice(job: &NotificationJob) -> Option<AttendanceNotice<'_>> {
    let date = job.scheduled_date.format("%Y-%m-%d").to_string();
    let notice = match &job.context {
        NotificationContext::DailyAbsence { class_name } => AttendanceNotice {
            student_name: &job.target_name,
            class_name: Some(class_name),
            parent_number: &job.contact_number,
            date,
            absent_count: None,
            status: None,
        },
        NotificationContext::MonthlyAbsence {
            class_name,
            absent_count,
        } => AttendanceNotice {
            student_name: &job.target_name,
            class_name: Some(class_name),
            parent_number: &job.contact_number,
            date,
            absent_count: Some(*absent_count),
            status: None,
        },
        NotificationContext::Arrival { class_name } => AttendanceNotice {
            student_name: &job.target_name,
            class_name: class_name.as_deref(),
            parent_number: &job.contact_number,
            date,
            absent_count: None,
            status: Some("present"),
        },
        NotificationContext::PaymentReminder { .. } => return None,
    };
    Some(notice)
}

fn payment_notice(job: &NotificationJob) -> Option<PaymentNotice<'_>> {
    match job.context {
        NotificationContext::PaymentReminder { month, year } => Some(PaymentNotice {
            student_name: &job.target_name,
            month,
            year,
            parent_number: &job.contact_number,
        }),
        _ => None,
    }
}

/// Wire body for `route`. Jobs that belong to the other route are skipped.
pub(crate) fn render_batch(
    route: NotificationRoute,
    jobs: &[NotificationJob],
) -> Result<serde_json::Value, serde_json::Error> {
    match route {
        NotificationRoute::Attendance => serde_json::to_value(AttendanceBatch {
            students: jobs.iter().filter_map(attendance_notice).collect(),
        }),
        NotificationRoute::Payment => serde_json::to_value(PaymentBatch {
            reminders: jobs.iter().filter_map(payment_notice).collect(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct BotError {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the messaging bot.
#[derive(Debug, Clone)]
pub struct HttpNotificationTransport {
    client: Client,
    base_url: String,
}

impl HttpNotificationTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| NotificationError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NotificationTransport for HttpNotificationTransport {
    async fn deliver(
        &self,
        route: NotificationRoute,
        jobs: &[NotificationJob],
    ) -> Result<(), NotificationError> {
        let body = render_batch(route, jobs)
            .map_err(|err| NotificationError::Transport(err.to_string()))?;

        let response = self
            .client
            .post(format!("{}{}", self.base_url, route.path()))
            .json(&body)
            .send()
            .await
            .map_err(|err| NotificationError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .json::<BotError>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "Failed to notify".to_string());

        Err(NotificationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
