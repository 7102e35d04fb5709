use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;
use tracing::warn;

/// Screen that accepts card presentations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntakeChannel {
    Attendance,
    AssistantLogin,
}

impl IntakeChannel {
    pub const fn ordered() -> [Self; 2] {
        [Self::Attendance, Self::AssistantLogin]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Attendance => "Attendance scanning",
            Self::AssistantLogin => "Assistant card login",
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::AssistantLogin => "assistant-login",
        }
    }

    /// Backend path relative to the API base URL.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Attendance => "/attendance/scan",
            Self::AssistantLogin => "/auth/card-login",
        }
    }

    /// JSON field the backend expects the card code under.
    pub const fn payload_field(self) -> &'static str {
        match self {
            Self::Attendance => "cardCode",
            Self::AssistantLogin => "cardId",
        }
    }

    pub const fn subject(self) -> &'static str {
        match self {
            Self::Attendance => "Student",
            Self::AssistantLogin => "Assistant",
        }
    }

    pub const fn failure_fallback(self) -> &'static str {
        match self {
            Self::Attendance => "Scan failed",
            Self::AssistantLogin => "Login failed",
        }
    }

    pub const fn default_mode(self) -> InputMode {
        match self {
            Self::Attendance => InputMode::Manual,
            Self::AssistantLogin => InputMode::Scanner,
        }
    }

    /// Whether a 2xx reply without a `success` flag counts as success. Card-login replies
    /// omit the flag; attendance replies always carry it.
    pub const fn flagless_success(self) -> bool {
        match self {
            Self::Attendance => false,
            Self::AssistantLogin => true,
        }
    }
}

impl fmt::Display for IntakeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for IntakeChannel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        Self::ordered()
            .into_iter()
            .find(|channel| channel.slug() == normalized)
            .ok_or_else(|| format!("unknown intake channel '{raw}'"))
    }
}

/// How the classifier decides an input burst is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    Scanner,
    Manual,
}

impl InputMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scanner => "Scanner Mode",
            Self::Manual => "Manual Entry",
        }
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scanner" | "scan" => Ok(Self::Scanner),
            "manual" | "keyboard" => Ok(Self::Manual),
            _ => Err(format!("unknown input mode '{raw}'")),
        }
    }
}

/// One input change as seen by the classifier: the whole current value of the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub code: String,
    pub arrival_time: Instant,
}

impl ScanEvent {
    pub fn new(code: impl Into<String>, arrival_time: Instant) -> Self {
        Self {
            code: code.into(),
            arrival_time,
        }
    }
}

/// Student or assistant details echoed back by the backend.
///
/// Decoding never fails: `_id` wins over `id`, numbers are kept as text and anything else
/// that is not a string is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPerson")]
pub struct PersonInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "parentWhatsAppNumber", skip_serializing_if = "Option::is_none")]
    pub parent_whatsapp_number: Option<String>,
    #[serde(rename = "groupCode", skip_serializing_if = "Option::is_none")]
    pub group_code: Option<String>,
}

#[derive(Deserialize)]
struct RawPerson {
    #[serde(default, rename = "_id")]
    record_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "fullName")]
    full_name: Option<Value>,
    #[serde(default, rename = "parentWhatsAppNumber")]
    parent_whatsapp_number: Option<Value>,
    #[serde(default, rename = "groupCode")]
    group_code: Option<Value>,
}

impl From<RawPerson> for PersonInfo {
    fn from(raw: RawPerson) -> Self {
        Self {
            id: scalar_text(raw.record_id).or_else(|| scalar_text(raw.id)),
            full_name: scalar_text(raw.full_name),
            parent_whatsapp_number: scalar_text(raw.parent_whatsapp_number),
            group_code: scalar_text(raw.group_code),
        }
    }
}

fn scalar_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl PersonInfo {
    pub fn named(full_name: impl Into<String>) -> Self {
        Self {
            full_name: Some(full_name.into()),
            ..Self::default()
        }
    }

    pub fn display_name(person: Option<&Self>, channel: IntakeChannel) -> String {
        person
            .and_then(|person| person.full_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown {}", channel.subject()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspensionKind {
    Temporary,
    Permanent,
}

impl SuspensionKind {
    pub const fn adverb(self) -> &'static str {
        match self {
            Self::Temporary => "temporarily",
            Self::Permanent => "permanently",
        }
    }
}

/// Suspension block as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspensionDetails {
    #[serde(rename = "type")]
    pub kind: SuspensionKind,
    #[serde(
        default,
        rename = "endDate",
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<NaiveDate>,
}

fn parse_backend_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as a date ({err})"))
}

/// An end date the backend sends in an unknown shape is dropped rather than failing the reply.
fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let date = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) if raw.trim().is_empty() => None,
        Some(Value::String(raw)) => match parse_backend_date(&raw) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!(%err, "ignoring suspension end date");
                None
            }
        },
        Some(other) => {
            warn!(value = %other, "ignoring non-text suspension end date");
            None
        }
    };
    Ok(date)
}

/// Classified result of one backend submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntakeOutcome {
    Success {
        person: Option<PersonInfo>,
    },
    AlreadyProcessed {
        message: Option<String>,
    },
    Suspended {
        suspension: SuspensionKind,
        until: Option<NaiveDate>,
        person: Option<PersonInfo>,
    },
    TransientError {
        message: Option<String>,
    },
}

impl IntakeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn category(&self) -> OutcomeCategory {
        match self {
            Self::Success { .. } => OutcomeCategory::Success,
            Self::AlreadyProcessed { .. } => OutcomeCategory::Info,
            Self::Suspended { .. } => OutcomeCategory::Rejected,
            Self::TransientError { .. } => OutcomeCategory::Error,
        }
    }
}

/// Severity shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Success,
    Info,
    Rejected,
    Error,
}

/// What the operator sees once an outcome has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutedOutcome {
    pub code: String,
    pub category: OutcomeCategory,
    pub message: String,
    pub outcome: IntakeOutcome,
}

/// Result of one card presentation, whichever state it ended in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntakeReport {
    /// Empty code; nothing was sent.
    Invalid { message: String },
    /// Code is still inside the dedup window.
    Duplicate { code: String, message: String },
    /// Another submission held the gate (or it was cooling down).
    Dropped { code: String },
    Routed(RoutedOutcome),
}

impl IntakeReport {
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Invalid { message } | Self::Duplicate { message, .. } => Some(message),
            Self::Dropped { .. } => None,
            Self::Routed(routed) => Some(&routed.message),
        }
    }

    pub fn outcome(&self) -> Option<&IntakeOutcome> {
        match self {
            Self::Routed(routed) => Some(&routed.outcome),
            _ => None,
        }
    }

    pub fn reached_backend(&self) -> bool {
        matches!(self, Self::Routed(_))
    }
}
