use std::sync::Arc;
use std::time::Duration;

use academy_desk::notifications::{
    DeliveryStatus, HttpNotificationTransport, NotificationDispatcher, NotificationJob,
    NotificationRoute,
};
use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date")
}

fn dispatcher(server: &MockServer) -> NotificationDispatcher<HttpNotificationTransport> {
    let transport =
        HttpNotificationTransport::new(format!("{}/api", server.uri()), Duration::from_secs(2))
            .expect("client builds");
    NotificationDispatcher::new(Arc::new(transport))
}

#[tokio::test]
async fn batch_is_split_across_both_bot_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/attendance"))
        .and(body_json(json!({
            "students": [{
                "studentName": "Sara Ali",
                "className": "G1-SAT",
                "parentNumber": "+201000000001",
                "date": "2025-03-01"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/payment"))
        .and(body_json(json!({
            "reminders": [{
                "studentName": "Omar Adel",
                "month": 3,
                "year": 2025,
                "parentNumber": "+201000000002"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let report = dispatcher(&server)
        .send_batch(vec![
            NotificationJob::payment_reminder("Omar Adel", "+201000000002", 3, 2025, day()),
            NotificationJob::daily_absence("Sara Ali", "+201000000001", "G1-SAT", day()),
        ])
        .await;

    assert!(report.all_delivered());
    let routes: Vec<NotificationRoute> = report.calls.iter().map(|call| call.route).collect();
    assert_eq!(
        routes,
        vec![NotificationRoute::Attendance, NotificationRoute::Payment]
    );
}

#[tokio::test]
async fn bot_rejection_is_reported_per_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/attendance"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({ "message": "WhatsApp client not ready" })),
        )
        .mount(&server)
        .await;

    let report = dispatcher(&server)
        .send_one(NotificationJob::monthly_absence(
            "Sara Ali",
            "+201000000001",
            "G1-SAT",
            4,
            day(),
        ))
        .await;

    assert!(!report.delivered());
    let DeliveryStatus::Failed { message } = report.delivery else {
        panic!("expected a failed delivery");
    };
    assert!(message.contains("503"));
    assert!(message.contains("WhatsApp client not ready"));
}

#[tokio::test]
async fn rejection_without_body_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/payment"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let report = dispatcher(&server)
        .send_one(NotificationJob::payment_reminder(
            "Omar Adel",
            "+201000000002",
            3,
            2025,
            day(),
        ))
        .await;

    assert_eq!(
        report.delivery,
        DeliveryStatus::Failed {
            message: "notification bot rejected the batch (500): Failed to notify".to_string()
        }
    );
}
