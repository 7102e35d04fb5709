use std::sync::Arc;
use std::time::Duration;

use super::common::{coordinator, manual_coordinator, student, HeldBackend, ScriptedBackend};
use crate::intake::{
    BackendError, BackendResponse, InputAck, InputMode, IntakeChannel, IntakeOutcome,
    IntakePhase, IntakeReport, ManualClock, OutcomeCategory, SuspensionKind,
};

/// Comfortably past the default 500 ms scan settle delay.
const PAST_SETTLE: Duration = Duration::from_millis(600);

fn assert_released<B>(coordinator: &crate::intake::IntakeCoordinator<B>)
where
    B: crate::intake::IntakeBackend + 'static,
{
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.gate_held, 0);
    assert_eq!(snapshot.gate_acquisitions, snapshot.gate_releases);
    assert_eq!(snapshot.buffer_len, 0);
    assert_eq!(snapshot.phase, IntakePhase::Idle);
    assert!(snapshot.in_flight.is_none());
}

#[tokio::test]
async fn accepted_code_is_refused_until_the_window_expires() {
    let backend = Arc::new(ScriptedBackend::default());
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(IntakeChannel::Attendance, backend.clone(), clock.clone());

    let first = coordinator.submit("A1").await;
    assert_eq!(first.message(), Some("Marked attendance for: Sara Ali"));
    assert!(coordinator.is_recently_accepted("A1"));

    clock.advance_millis(1_000);
    let repeat = coordinator.submit("A1").await;
    assert_eq!(
        repeat,
        IntakeReport::Duplicate {
            code: "A1".to_string(),
            message: "This card was already scanned recently.".to_string(),
        }
    );
    assert_eq!(backend.codes(), vec!["A1"]);

    clock.advance_millis(5_000);
    let later = coordinator.submit("A1").await;
    assert!(later.reached_backend());
    assert_eq!(backend.codes(), vec!["A1", "A1"]);
}

#[tokio::test]
async fn suspended_card_is_not_remembered() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.reply(Ok(BackendResponse::suspended(
        SuspensionKind::Permanent,
        None,
        Some(student("Omar Adel")),
    )));
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(IntakeChannel::Attendance, backend.clone(), clock.clone());

    let report = coordinator.submit("B2").await;
    let IntakeReport::Routed(routed) = report else {
        panic!("suspension should reach the router");
    };
    assert_eq!(routed.category, OutcomeCategory::Rejected);
    assert!(routed.message.contains("permanently"));
    assert!(routed.message.contains("Omar Adel"));
    assert!(!coordinator.is_recently_accepted("B2"));
    assert_released(&coordinator);

    clock.advance_millis(250);
    let retry = coordinator.submit("B2").await;
    assert!(retry.reached_backend());
    assert_eq!(backend.codes(), vec!["B2", "B2"]);
}

#[tokio::test]
async fn failed_submission_can_be_retried_after_cooldown() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.reply(Ok(BackendResponse::failure("Card not registered")));
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(IntakeChannel::Attendance, backend.clone(), clock.clone());

    let report = coordinator.submit("A7").await;
    assert_eq!(report.message(), Some("Card not registered"));
    assert_eq!(
        report.outcome(),
        Some(&IntakeOutcome::TransientError {
            message: Some("Card not registered".to_string())
        })
    );
    assert_released(&coordinator);

    let bounce = coordinator.submit("A7").await;
    assert_eq!(
        bounce,
        IntakeReport::Dropped {
            code: "A7".to_string()
        }
    );

    clock.advance_millis(250);
    assert!(coordinator.submit("A7").await.reached_backend());
    assert_eq!(backend.codes(), vec!["A7", "A7"]);
}

#[tokio::test]
async fn second_card_is_dropped_while_first_is_in_flight() {
    let backend = Arc::new(HeldBackend::default());
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(IntakeChannel::Attendance, backend.clone(), clock.clone());

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit("C3").await })
    };
    backend.started.notified().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.gate_held, 1);
    assert_eq!(snapshot.in_flight.as_deref(), Some("C3"));
    assert_eq!(snapshot.phase, IntakePhase::Submitting);

    let second = coordinator.submit("D4").await;
    assert_eq!(
        second,
        IntakeReport::Dropped {
            code: "D4".to_string()
        }
    );

    backend.release.notify_one();
    let first = first.await.expect("submission task completes");
    assert!(first.reached_backend());
    assert_eq!(backend.codes(), vec!["C3"]);
    assert_released(&coordinator);
}

#[tokio::test]
async fn cancelled_submission_still_releases_the_gate() {
    let backend = Arc::new(HeldBackend::default());
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(IntakeChannel::Attendance, backend.clone(), clock.clone());

    let task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit("E5").await })
    };
    backend.started.notified().await;
    assert_eq!(coordinator.snapshot().gate_held, 1);

    task.abort();
    assert!(task.await.is_err());

    assert_released(&coordinator);
    assert_eq!(coordinator.snapshot().gate_releases, 1);
    assert!(!coordinator.is_recently_accepted("E5"));
}

#[tokio::test]
async fn every_terminal_path_clears_the_field_and_frees_the_gate() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.reply(Err(BackendError::Transport("connection refused".to_string())));
    backend.reply(Err(BackendError::Rejected {
        status: 409,
        message: Some("Attendance already marked for today".to_string()),
    }));
    let clock = Arc::new(ManualClock::new());
    let coordinator = manual_coordinator(IntakeChannel::Attendance, backend.clone(), clock.clone());

    assert!(!coordinator.observe_input("   ").settling);
    let invalid = coordinator.submit_buffer().await;
    assert_eq!(
        invalid,
        IntakeReport::Invalid {
            message: "Please enter or scan a card code.".to_string()
        }
    );
    assert_released(&coordinator);

    coordinator.observe_input("F6");
    let transport = coordinator.submit_buffer().await;
    assert_eq!(transport.message(), Some("Scan failed"));
    assert_released(&coordinator);

    clock.advance_millis(250);
    coordinator.observe_input("F6");
    let already = coordinator.submit_buffer().await;
    let IntakeReport::Routed(routed) = already else {
        panic!("rejection should reach the router");
    };
    assert_eq!(routed.category, OutcomeCategory::Info);
    assert_eq!(routed.message, "Attendance already marked for today");
    assert_released(&coordinator);

    clock.advance_millis(250);
    coordinator.observe_input("F6");
    assert!(coordinator.submit_buffer().await.reached_backend());
    assert_released(&coordinator);

    clock.advance_millis(250);
    coordinator.observe_input("F6");
    assert!(matches!(
        coordinator.submit_buffer().await,
        IntakeReport::Duplicate { .. }
    ));
    assert_released(&coordinator);

    assert_eq!(backend.codes(), vec!["F6", "F6", "F6"]);
}

#[tokio::test]
async fn empty_code_never_reaches_the_backend() {
    let backend = Arc::new(ScriptedBackend::default());
    let coordinator = coordinator(
        IntakeChannel::Attendance,
        backend.clone(),
        Arc::new(ManualClock::new()),
    );

    let report = coordinator.submit(" \t ").await;
    assert!(matches!(report, IntakeReport::Invalid { .. }));
    assert!(backend.codes().is_empty());
    assert_eq!(coordinator.snapshot().gate_acquisitions, 0);
}

#[tokio::test(start_paused = true)]
async fn scanner_mode_submits_the_whole_code_once_input_settles() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.reply(Ok(BackendResponse::success(Some(student("Mona Hany")))));
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(IntakeChannel::AssistantLogin, backend.clone(), clock.clone());
    assert_eq!(coordinator.snapshot().mode, InputMode::Scanner);

    assert!(!coordinator.observe_input("AS1").settling);
    clock.advance_millis(10);
    assert!(coordinator.observe_input("AS1234").settling);
    clock.advance_millis(10);
    assert_eq!(
        coordinator.observe_input("AS12345678"),
        InputAck {
            buffer_len: 10,
            settling: true,
        }
    );
    assert!(backend.codes().is_empty());

    tokio::time::sleep(PAST_SETTLE).await;

    assert_eq!(backend.codes(), vec!["AS12345678"]);
    assert_eq!(backend.channels(), vec![IntakeChannel::AssistantLogin]);
    let snapshot = coordinator.snapshot();
    assert_eq!(
        snapshot.last_report.as_ref().and_then(IntakeReport::message),
        Some("Signed in as Mona Hany")
    );
    assert_released(&coordinator);
}

#[tokio::test(start_paused = true)]
async fn input_inside_the_settle_delay_extends_the_burst() {
    let backend = Arc::new(ScriptedBackend::default());
    let coordinator = coordinator(
        IntakeChannel::AssistantLogin,
        backend.clone(),
        Arc::new(ManualClock::new()),
    );

    coordinator.observe_input("AS1234");
    tokio::time::sleep(Duration::from_millis(300)).await;
    coordinator.observe_input("AS12345678");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(backend.codes().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.codes(), vec!["AS12345678"]);
}

#[tokio::test(start_paused = true)]
async fn explicit_submit_preempts_a_settling_scan() {
    let backend = Arc::new(ScriptedBackend::default());
    let coordinator = coordinator(
        IntakeChannel::AssistantLogin,
        backend.clone(),
        Arc::new(ManualClock::new()),
    );

    assert!(coordinator.observe_input("AS123456").settling);
    assert!(coordinator.submit_buffer().await.reached_backend());

    tokio::time::sleep(PAST_SETTLE).await;
    assert_eq!(backend.codes(), vec!["AS123456"]);
    assert_released(&coordinator);
}

#[tokio::test]
async fn manual_mode_waits_for_explicit_submit() {
    let backend = Arc::new(ScriptedBackend::default());
    let coordinator = coordinator(
        IntakeChannel::Attendance,
        backend.clone(),
        Arc::new(ManualClock::new()),
    );

    assert!(!coordinator.observe_input("STU-000123").settling);
    assert_eq!(coordinator.snapshot().buffer_len, 10);
    assert!(backend.codes().is_empty());

    assert!(coordinator.submit_buffer().await.reached_backend());
    assert_eq!(backend.codes(), vec!["STU-000123"]);
}

#[tokio::test]
async fn switching_mode_clears_the_field() {
    let backend = Arc::new(ScriptedBackend::default());
    let coordinator = coordinator(
        IntakeChannel::AssistantLogin,
        backend.clone(),
        Arc::new(ManualClock::new()),
    );

    coordinator.observe_input("AS");
    coordinator.set_mode(InputMode::Manual);

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.mode, InputMode::Manual);
    assert_eq!(snapshot.buffer_len, 0);

    assert!(!coordinator.observe_input("AS1234").settling);
    assert!(backend.codes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn keystrokes_from_a_wedge_scanner_submit_the_whole_code_once() {
    let backend = Arc::new(ScriptedBackend::default());
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(IntakeChannel::AssistantLogin, backend.clone(), clock.clone());

    for ch in "AS12345678".chars() {
        tokio::time::sleep(Duration::from_millis(4)).await;
        clock.advance_millis(4);
        coordinator.observe_keystroke(ch);
    }
    assert!(backend.codes().is_empty());

    tokio::time::sleep(PAST_SETTLE).await;

    assert_eq!(backend.codes(), vec!["AS12345678"]);
    assert!(coordinator
        .snapshot()
        .last_report
        .is_some_and(|report| report.reached_backend()));
    assert_released(&coordinator);
}
