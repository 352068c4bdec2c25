use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Local, NaiveDate};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, AppointmentPatch, AppointmentStatus, BookAppointmentRequest,
};
use appointment_cell::services::booking::AppointmentBookingService;
use notification_cell::MailerService;
use shared_config::AppConfig;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

const AVAILABLE_HOURS: [&str; 3] = ["09:00", "10:00", "11:00"];

fn test_config(supabase: &MockServer, mail: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = supabase.uri();
    config.mail_api_url = mail.uri();
    config
}

fn booking_service(config: &AppConfig) -> AppointmentBookingService {
    AppointmentBookingService::new(config, Arc::new(MailerService::new(config)))
}

fn future_date() -> NaiveDate {
    (Local::now() + Duration::days(30)).date_naive()
}

fn booking_request(patient: &TestUser, doctor: &TestUser, date: NaiveDate, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_id: Some(Uuid::parse_str(&patient.id).unwrap()),
        doctor_id: Uuid::parse_str(&doctor.id).unwrap(),
        appointment_date: date,
        appointment_time: time.to_string(),
        notes: None,
    }
}

/// Directory lookups shared by most booking tests: the doctor account, the
/// doctor profile with the standard hours, and the patient account.
async fn mount_directory_mocks(server: &MockServer, patient: &TestUser, doctor: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(&doctor.id, "Ana", &doctor.email, "doctor")
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_row(&doctor.id, "Cardiology", &AVAILABLE_HOURS)
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(&patient.id, "Alice", &patient.email, "patient")
        ])))
        .mount(server)
        .await;
}

async fn mount_free_slot_mock(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

fn mail_ok() -> Mock {
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
}

#[tokio::test]
async fn booking_succeeds_and_sends_confirmation() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("alice@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let date = future_date();

    mount_directory_mocks(&supabase, &patient, &doctor).await;
    mount_free_slot_mock(&supabase).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &patient.id,
                &doctor.id,
                &date.to_string(),
                "10:00",
                "scheduled",
            )
        ])))
        .mount(&supabase)
        .await;

    mail_ok().expect(1).mount(&mail).await;

    let config = test_config(&supabase, &mail);
    let service = booking_service(&config);

    let appointment = service
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, date, "10:00"),
            "token",
        )
        .await
        .expect("booking should succeed");

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.appointment_time, "10:00");
}

#[tokio::test]
async fn booking_fails_when_slot_is_taken() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("bob@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let date = future_date();

    mount_directory_mocks(&supabase, &patient, &doctor).await;

    // Another patient already holds (Ana, date, 10:00).
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4() }
        ])))
        .mount(&supabase)
        .await;

    mail_ok().expect(0).mount(&mail).await;

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, date, "10:00"),
            "token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::SlotConflict));
}

#[tokio::test]
async fn cancelled_slot_can_be_rebooked() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("carol@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let date = future_date();

    mount_directory_mocks(&supabase, &patient, &doctor).await;

    // The conflict read excludes cancelled rows, so a slot freed by
    // cancellation comes back empty.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("appointment_time", "eq.09:00"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&supabase)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &patient.id,
                &doctor.id,
                &date.to_string(),
                "09:00",
                "scheduled",
            )
        ])))
        .mount(&supabase)
        .await;

    mail_ok().mount(&mail).await;

    let config = test_config(&supabase, &mail);
    let appointment = booking_service(&config)
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, date, "09:00"),
            "token",
        )
        .await
        .expect("freed slot should be bookable");

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn booking_fails_outside_published_hours() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("dave@example.com");
    let doctor = TestUser::doctor("ana@example.com");

    mount_directory_mocks(&supabase, &patient, &doctor).await;

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, future_date(), "08:00"),
            "token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn booking_fails_for_past_datetime() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("erin@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let yesterday = (Local::now() - Duration::days(1)).date_naive();

    mount_directory_mocks(&supabase, &patient, &doctor).await;
    mount_free_slot_mock(&supabase).await;

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, yesterday, "10:00"),
            "token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::PastDate));
}

#[tokio::test]
async fn booking_fails_when_doctor_is_unknown() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("fred@example.com");
    let doctor = TestUser::doctor("ghost@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&supabase)
        .await;

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, future_date(), "10:00"),
            "token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn store_conflict_on_insert_maps_to_slot_conflict() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("gina@example.com");
    let doctor = TestUser::doctor("ana@example.com");

    mount_directory_mocks(&supabase, &patient, &doctor).await;
    mount_free_slot_mock(&supabase).await;

    // The pre-check saw a free slot, but a concurrent booking won the
    // race and the unique index rejected the insert.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_slot_key\""
        })))
        .mount(&supabase)
        .await;

    mail_ok().expect(0).mount(&mail).await;

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, future_date(), "10:00"),
            "token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::SlotConflict));
}

#[tokio::test]
async fn booking_survives_notification_failure() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("henry@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let date = future_date();

    mount_directory_mocks(&supabase, &patient, &doctor).await;
    mount_free_slot_mock(&supabase).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &patient.id,
                &doctor.id,
                &date.to_string(),
                "11:00",
                "scheduled",
            )
        ])))
        .mount(&supabase)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp relay down"))
        .expect(1)
        .mount(&mail)
        .await;

    let config = test_config(&supabase, &mail);
    let appointment = booking_service(&config)
        .book_appointment(
            &patient.to_user(),
            booking_request(&patient, &doctor, date, "11:00"),
            "token",
        )
        .await
        .expect("notification failure must not fail the booking");

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn unprivileged_caller_cannot_book_for_another_patient() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("ivan@example.com");
    let other = TestUser::patient("judy@example.com");
    let doctor = TestUser::doctor("ana@example.com");

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .book_appointment(
            &other.to_user(),
            booking_request(&patient, &doctor, future_date(), "10:00"),
            "token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::Forbidden));
}

// ==============================================================================
// UPDATE / CANCEL
// ==============================================================================

async fn mount_detail_mock(server: &MockServer, appointment_id: Uuid, row: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

fn detail_row(
    appointment_id: Uuid,
    patient: &TestUser,
    doctor: &TestUser,
    status: &str,
) -> serde_json::Value {
    let mut row = MockSupabaseResponses::appointment_detail_row(
        &patient.id,
        &doctor.id,
        "2025-06-10",
        "10:00",
        status,
    );
    row["id"] = json!(appointment_id);
    row
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("kate@example.com");
    let config = test_config(&supabase, &mail);

    let result = booking_service(&config)
        .update_appointment(
            &patient.to_user(),
            Uuid::new_v4(),
            AppointmentPatch::default(),
            "token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidInput(_)));
}

#[tokio::test]
async fn cancelling_notifies_exactly_once() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("liam@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let appointment_id = Uuid::new_v4();

    mount_detail_mock(
        &supabase,
        appointment_id,
        detail_row(appointment_id, &patient, &doctor, "scheduled"),
    )
    .await;

    let mut cancelled = MockSupabaseResponses::appointment_row(
        &patient.id,
        &doctor.id,
        "2025-06-10",
        "10:00",
        "cancelled",
    );
    cancelled["id"] = json!(appointment_id);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&supabase)
        .await;

    mail_ok().expect(1).mount(&mail).await;

    let config = test_config(&supabase, &mail);
    let updated = booking_service(&config)
        .cancel_appointment(&patient.to_user(), appointment_id, "token")
        .await
        .expect("cancel should succeed");

    assert_eq!(updated.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_twice_reports_already_cancelled() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("mona@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let appointment_id = Uuid::new_v4();

    mount_detail_mock(
        &supabase,
        appointment_id,
        detail_row(appointment_id, &patient, &doctor, "cancelled"),
    )
    .await;

    mail_ok().expect(0).mount(&mail).await;

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .cancel_appointment(&patient.to_user(), appointment_id, "token")
        .await;

    assert_matches!(result, Err(AppointmentError::AlreadyCancelled));
}

#[tokio::test]
async fn redundant_cancel_through_update_does_not_notify() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("nina@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let appointment_id = Uuid::new_v4();

    mount_detail_mock(
        &supabase,
        appointment_id,
        detail_row(appointment_id, &patient, &doctor, "cancelled"),
    )
    .await;

    let mut row = MockSupabaseResponses::appointment_row(
        &patient.id,
        &doctor.id,
        "2025-06-10",
        "10:00",
        "cancelled",
    );
    row["id"] = json!(appointment_id);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&supabase)
        .await;

    mail_ok().expect(0).mount(&mail).await;

    let config = test_config(&supabase, &mail);
    let patch = AppointmentPatch {
        status: Some(AppointmentStatus::Cancelled),
        notes: None,
    };
    let updated = booking_service(&config)
        .update_appointment(&patient.to_user(), appointment_id, patch, "token")
        .await
        .expect("redundant cancel through update is a no-op");

    assert_eq!(updated.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn cancelled_appointments_cannot_be_reopened() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("oscar@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let appointment_id = Uuid::new_v4();

    mount_detail_mock(
        &supabase,
        appointment_id,
        detail_row(appointment_id, &patient, &doctor, "cancelled"),
    )
    .await;

    let config = test_config(&supabase, &mail);
    let patch = AppointmentPatch {
        status: Some(AppointmentStatus::Scheduled),
        notes: None,
    };
    let result = booking_service(&config)
        .update_appointment(&patient.to_user(), appointment_id, patch, "token")
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidInput(_)));
}

#[tokio::test]
async fn outsiders_cannot_touch_an_appointment() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("pam@example.com");
    let doctor = TestUser::doctor("ana@example.com");
    let outsider = TestUser::patient("intruder@example.com");
    let appointment_id = Uuid::new_v4();

    mount_detail_mock(
        &supabase,
        appointment_id,
        detail_row(appointment_id, &patient, &doctor, "scheduled"),
    )
    .await;

    let config = test_config(&supabase, &mail);
    let result = booking_service(&config)
        .get_appointment(&outsider.to_user(), appointment_id, "token")
        .await;

    assert_matches!(result, Err(AppointmentError::Forbidden));
}

// ==============================================================================
// LISTINGS AND STATS
// ==============================================================================

#[tokio::test]
async fn doctor_listing_is_scoped_to_their_schedule() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let patient = TestUser::patient("quinn@example.com");
    let doctor = TestUser::doctor("ana@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_detail_row(
                &patient.id,
                &doctor.id,
                "2025-06-10",
                "10:00",
                "scheduled",
            )
        ])))
        .expect(1)
        .mount(&supabase)
        .await;

    let config = test_config(&supabase, &mail);
    let appointments = booking_service(&config)
        .list_appointments(&doctor.to_user(), "token")
        .await
        .expect("listing should succeed");

    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].patient.full_name, "Test Patient");
    assert_eq!(
        appointments[0]
            .doctor
            .profile
            .as_ref()
            .map(|p| p.specialty.as_str()),
        Some("General Practice")
    );
}

#[tokio::test]
async fn stats_count_by_status_and_exclude_patients() {
    let supabase = MockServer::start().await;
    let mail = MockServer::start().await;

    let doctor = TestUser::doctor("ana@example.com");
    let patient = TestUser::patient("rita@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "status": "scheduled" },
            { "status": "scheduled" },
            { "status": "completed" },
            { "status": "cancelled" }
        ])))
        .mount(&supabase)
        .await;

    let config = test_config(&supabase, &mail);
    let service = booking_service(&config);

    let stats = service
        .get_appointment_stats(&doctor.to_user(), "token")
        .await
        .expect("doctor stats should succeed");
    assert_eq!(stats.total_appointments, 4);
    assert_eq!(stats.scheduled, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.confirmed, 0);

    let result = service
        .get_appointment_stats(&patient.to_user(), "token")
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden));
}
