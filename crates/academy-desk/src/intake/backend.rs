use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::domain::{IntakeChannel, PersonInfo, SuspensionDetails, SuspensionKind};
use super::outcome::SUSPENDED_MESSAGE;

/// Backend envelope for a card presentation.
///
/// Only `success` must have the right shape. A malformed `data` member, or any malformed
/// field inside it, decodes as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BackendResponse {
    /// Absent on card-login replies; see [`IntakeChannel::flagless_success`].
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_data")]
    pub data: BackendData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BackendData {
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub student: Option<PersonInfo>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub assistant: Option<PersonInfo>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub suspension: Option<SuspensionDetails>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub message: Option<String>,
}

impl BackendData {
    /// The card holder, whichever key the backend used.
    pub fn person(&self) -> Option<&PersonInfo> {
        self.student.as_ref().or(self.assistant.as_ref())
    }

    pub fn into_person(self) -> Option<PersonInfo> {
        self.student.or(self.assistant)
    }
}

fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => {
            warn!(%err, "ignoring malformed backend field");
            Ok(None)
        }
    }
}

fn deserialize_data<'de, D>(deserializer: D) -> Result<BackendData, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_lenient(deserializer)?.unwrap_or_default())
}

impl BackendResponse {
    pub fn success(person: Option<PersonInfo>) -> Self {
        Self {
            success: Some(true),
            data: BackendData {
                student: person,
                ..BackendData::default()
            },
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            data: BackendData {
                message: Some(message.into()),
                ..BackendData::default()
            },
        }
    }

    pub fn suspended(
        kind: SuspensionKind,
        end_date: Option<chrono::NaiveDate>,
        person: Option<PersonInfo>,
    ) -> Self {
        Self {
            success: Some(false),
            data: BackendData {
                student: person,
                suspension: Some(SuspensionDetails { kind, end_date }),
                message: Some(SUSPENDED_MESSAGE.to_string()),
                ..BackendData::default()
            },
        }
    }

    /// Whether `channel` counts this reply as a success.
    pub fn succeeded(&self, channel: IntakeChannel) -> bool {
        self.success.unwrap_or_else(|| channel.flagless_success())
    }

    /// Not flagged successful, carrying the suspension message.
    pub fn is_suspension(&self) -> bool {
        self.success != Some(true) && self.data.message.as_deref() == Some(SUSPENDED_MESSAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend rejected the request with status {status}")]
    Rejected { status: u16, message: Option<String> },
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend did not answer in time")]
    Timeout,
    #[error("unreadable backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Message the backend attached to a rejection, if any.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            BackendError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Backend call made for each accepted card presentation.
#[async_trait]
pub trait IntakeBackend: Send + Sync {
    async fn submit_card_presentation(
        &self,
        channel: IntakeChannel,
        code: &str,
    ) -> Result<BackendResponse, BackendError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "deserialize_lenient")]
    message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_data")]
    data: BackendData,
}

/// REST client for `/attendance/scan` and `/auth/card-login`.
#[derive(Debug, Clone)]
pub struct HttpIntakeBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpIntakeBackend {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url_for(&self, channel: IntakeChannel) -> String {
        format!("{}{}", self.base_url, channel.endpoint())
    }
}

#[async_trait]
impl IntakeBackend for HttpIntakeBackend {
    async fn submit_card_presentation(
        &self,
        channel: IntakeChannel,
        code: &str,
    ) -> Result<BackendResponse, BackendError> {
        let mut payload = Map::new();
        payload.insert(
            channel.payload_field().to_string(),
            Value::String(code.to_string()),
        );

        let mut request = self.client.post(self.url_for(channel)).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(BackendError::from_reqwest)?;
        let status = response.status();
        let body = response.bytes().await.map_err(BackendError::from_reqwest)?;
        debug!(%channel, status = status.as_u16(), "backend answered card presentation");

        if status.is_success() {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(BackendResponse::default());
            }
            return serde_json::from_slice(&body)
                .map_err(|err| BackendError::Decode(err.to_string()));
        }

        if let Ok(envelope) = serde_json::from_slice::<BackendResponse>(&body) {
            if envelope.is_suspension() {
                return Ok(envelope);
            }
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|body| {
                body.message.or(body.data.message)
            })
            .filter(|message| !message.trim().is_empty());

        Err(BackendError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
