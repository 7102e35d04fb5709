use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::intake::{
    BackendError, BackendResponse, InputMode, IntakeBackend, IntakeChannel, IntakeCoordinator,
    IntakeSettings, ManualClock, PersonInfo,
};
use crate::notifications::{NotificationError, NotificationJob, NotificationRoute, NotificationTransport};

pub(super) fn student(name: &str) -> PersonInfo {
    PersonInfo {
        id: Some(format!("stu-{}", name.len())),
        full_name: Some(name.to_string()),
        parent_whatsapp_number: Some("+201000000001".to_string()),
        group_code: Some("G1-SAT".to_string()),
    }
}

/// Replies from a script, then succeeds for everything else.
#[derive(Default)]
pub(super) struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<BackendResponse, BackendError>>>,
    calls: Mutex<Vec<(IntakeChannel, String)>>,
}

impl ScriptedBackend {
    pub(super) fn reply(&self, reply: Result<BackendResponse, BackendError>) {
        self.replies
            .lock()
            .expect("replies mutex poisoned")
            .push_back(reply);
    }

    pub(super) fn codes(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .map(|(_, code)| code.clone())
            .collect()
    }

    pub(super) fn channels(&self) -> Vec<IntakeChannel> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .map(|(channel, _)| *channel)
            .collect()
    }
}

#[async_trait]
impl IntakeBackend for ScriptedBackend {
    async fn submit_card_presentation(
        &self,
        channel: IntakeChannel,
        code: &str,
    ) -> Result<BackendResponse, BackendError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push((channel, code.to_string()));
        self.replies
            .lock()
            .expect("replies mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(BackendResponse::success(Some(student("Sara Ali")))))
    }
}

/// Parks every call until the test lets it go.
#[derive(Default)]
pub(super) struct HeldBackend {
    pub(super) started: Notify,
    pub(super) release: Notify,
    calls: Mutex<Vec<String>>,
}

impl HeldBackend {
    pub(super) fn codes(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl IntakeBackend for HeldBackend {
    async fn submit_card_presentation(
        &self,
        _channel: IntakeChannel,
        code: &str,
    ) -> Result<BackendResponse, BackendError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(code.to_string());
        self.started.notify_one();
        self.release.notified().await;
        Ok(BackendResponse::success(Some(student("Sara Ali"))))
    }
}

#[derive(Default)]
pub(super) struct RecordingTransport {
    jobs: Mutex<Vec<(NotificationRoute, NotificationJob)>>,
}

impl RecordingTransport {
    pub(super) fn jobs(&self) -> Vec<(NotificationRoute, NotificationJob)> {
        self.jobs.lock().expect("jobs mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn deliver(
        &self,
        route: NotificationRoute,
        jobs: &[NotificationJob],
    ) -> Result<(), NotificationError> {
        let mut guard = self.jobs.lock().expect("jobs mutex poisoned");
        guard.extend(jobs.iter().cloned().map(|job| (route, job)));
        Ok(())
    }
}

pub(super) fn settings(channel: IntakeChannel) -> IntakeSettings {
    IntakeSettings::for_channel(channel)
}

pub(super) fn coordinator<B>(
    channel: IntakeChannel,
    backend: Arc<B>,
    clock: Arc<ManualClock>,
) -> Arc<IntakeCoordinator<B>>
where
    B: IntakeBackend + 'static,
{
    Arc::new(IntakeCoordinator::with_clock(
        channel,
        backend,
        &settings(channel),
        clock,
    ))
}

pub(super) fn manual_coordinator<B>(
    channel: IntakeChannel,
    backend: Arc<B>,
    clock: Arc<ManualClock>,
) -> Arc<IntakeCoordinator<B>>
where
    B: IntakeBackend + 'static,
{
    let settings = settings(channel).with_mode(InputMode::Manual);
    Arc::new(IntakeCoordinator::with_clock(channel, backend, &settings, clock))
}
