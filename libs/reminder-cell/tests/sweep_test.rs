use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::MailerService;
use reminder_cell::ReminderSweepService;
use shared_config::AppConfig;

fn test_config(supabase: &MockServer, mail: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: supabase.uri(),
        supabase_anon_key: "anon".to_string(),
        supabase_service_role_key: "service".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        mail_api_url: mail.uri(),
        mail_api_key: "mail-key".to_string(),
        mail_from_address: "no-reply@medbook.test".to_string(),
        mail_from_name: "Medbook Appointments".to_string(),
        reminder_hour: 8,
        port: 3000,
    }
}

fn sweep_service(config: &AppConfig) -> ReminderSweepService {
    ReminderSweepService::new(config, Arc::new(MailerService::new(config)))
}

fn detail_row(status: &str, email: Option<&str>) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": Uuid::new_v4(),
        "doctor_id": Uuid::new_v4(),
        "appointment_date": "2025-06-10",
        "appointment_time": "10:00",
        "status": status,
        "notes": null,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "patient": { "full_name": "Test Patient", "email": email },
        "doctor": {
            "full_name": "Dr. Test",
            "email": "doctor@example.com",
            "profile": { "specialty": "Cardiology", "consultation_fee": 150.0, "phone": null }
        }
    })
}

#[tokio::test]
async fn sweep_reminds_active_appointments_only() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;
    let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

    // The query itself narrows to active rows; the cancelled row simulates
    // a store that did not, and must still be skipped.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("appointment_date", "eq.2025-06-10"))
        .and(query_param("status", "in.(scheduled,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            detail_row("scheduled", Some("one@example.com")),
            detail_row("confirmed", Some("two@example.com")),
            detail_row("cancelled", Some("three@example.com"))
        ])))
        .expect(1)
        .mount(&supabase)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg"})))
        .expect(2)
        .mount(&mail)
        .await;

    let config = test_config(&supabase, &mail);
    let report = sweep_service(&config)
        .remind_for_date(date)
        .await
        .expect("sweep should succeed");

    assert_eq!(report.scanned, 2);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn one_failed_send_does_not_abort_the_sweep() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;
    let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            detail_row("scheduled", Some("one@example.com")),
            detail_row("scheduled", Some("two@example.com"))
        ])))
        .mount(&supabase)
        .await;

    // First send fails, second succeeds.
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("relay down"))
        .up_to_n_times(1)
        .mount(&mail)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg"})))
        .expect(1)
        .mount(&mail)
        .await;

    let config = test_config(&supabase, &mail);
    let report = sweep_service(&config)
        .remind_for_date(date)
        .await
        .expect("sweep should survive a failed send");

    assert_eq!(report.scanned, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn missing_patient_email_is_skipped() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;
    let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            detail_row("scheduled", None),
            detail_row("scheduled", Some("two@example.com"))
        ])))
        .mount(&supabase)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg"})))
        .expect(1)
        .mount(&mail)
        .await;

    let config = test_config(&supabase, &mail);
    let report = sweep_service(&config)
        .remind_for_date(date)
        .await
        .expect("sweep should succeed");

    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn empty_schedule_sends_nothing() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;
    let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&supabase)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mail)
        .await;

    let config = test_config(&supabase, &mail);
    let report = sweep_service(&config)
        .remind_for_date(date)
        .await
        .expect("sweep should succeed");

    assert_eq!(report.scanned, 0);
    assert_eq!(report.sent, 0);
}
