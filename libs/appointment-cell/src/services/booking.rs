use std::future::Future;
use std::sync::Arc;

use chrono::{Local, NaiveTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::DirectoryService;
use notification_cell::{MailerError, MailerService};
use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentDetail, AppointmentError, AppointmentPatch, AppointmentStats,
    AppointmentStatus, BookAppointmentRequest, APPOINTMENT_DETAIL_SELECT,
};
use crate::services::lifecycle::AppointmentLifecycleService;

#[derive(Debug, Deserialize)]
struct StatusRow {
    status: AppointmentStatus,
}

/// The scheduling engine. Decides whether a booking or mutation is
/// permitted, applies it through the store, and triggers the notifications
/// owed by the resulting state transition.
pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    directory: DirectoryService,
    lifecycle: AppointmentLifecycleService,
    mailer: Arc<MailerService>,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig, mailer: Arc<MailerService>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            directory: DirectoryService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            mailer,
        }
    }

    /// Book an appointment. The caller books for themself unless a
    /// privileged role (doctor, admin) names another patient.
    ///
    /// The store's partial unique index is the final arbiter of the
    /// no-double-booking invariant; the explicit conflict read here exists
    /// to report `SlotConflict` without an insert round-trip, and a 409
    /// from the insert maps to the same error for races it cannot see.
    pub async fn book_appointment(
        &self,
        caller: &User,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = self.resolve_patient(caller, request.patient_id)?;

        info!(
            "Booking appointment for patient {} with doctor {}",
            patient_id, request.doctor_id
        );

        let doctor_user = self
            .directory
            .find_user_by_id(request.doctor_id, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .filter(|u| u.is_doctor())
            .ok_or(AppointmentError::DoctorNotFound)?;

        let profile = self
            .directory
            .find_doctor_profile(request.doctor_id, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .ok_or(AppointmentError::DoctorNotFound)?;

        // Membership is checked against the doctor's currently published
        // hours, not a snapshot from when the patient browsed them.
        if !profile.available_hours.contains(&request.appointment_time) {
            return Err(AppointmentError::SlotUnavailable);
        }

        let patient = self
            .directory
            .find_user_by_id(patient_id, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .ok_or(AppointmentError::PatientNotFound)?;

        self.check_slot_free(
            request.doctor_id,
            &request.appointment_date.to_string(),
            &request.appointment_time,
            auth_token,
        )
        .await?;

        let time = NaiveTime::parse_from_str(&request.appointment_time, "%H:%M")
            .map_err(|_| {
                AppointmentError::InvalidInput(format!(
                    "Invalid appointment time: {}",
                    request.appointment_time
                ))
            })?;
        if request.appointment_date.and_time(time) <= Local::now().naive_local() {
            return Err(AppointmentError::PastDate);
        }

        let now = Utc::now();
        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "appointment_date": request.appointment_date,
            "appointment_time": request.appointment_time,
            "status": AppointmentStatus::Scheduled.to_string(),
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| match e {
                // Lost the race for the slot: the unique index rejected us.
                DbError::Conflict(_) => AppointmentError::SlotConflict,
                other => AppointmentError::Database(other.to_string()),
            })?;

        let appointment = rows.into_iter().next().ok_or_else(|| {
            AppointmentError::Database("Failed to create appointment".to_string())
        })?;

        // The row is durably persisted at this point; the confirmation is
        // best-effort and never unwinds the booking.
        if let Some(email) = &patient.email {
            self.dispatch(
                "booking confirmation",
                self.mailer.send_booking_confirmation(
                    email,
                    &patient.full_name,
                    &doctor_user.full_name,
                    appointment.appointment_date,
                    &appointment.appointment_time,
                    &profile.specialty,
                ),
            )
            .await;
        }

        info!(
            "Appointment {} booked for {} at {}",
            appointment.id, appointment.appointment_date, appointment.appointment_time
        );
        Ok(appointment)
    }

    /// Apply a partial update. Crossing into `cancelled` emits exactly one
    /// cancellation notice; a redundant cancel-of-cancelled write is a
    /// silent no-op.
    pub async fn update_appointment(
        &self,
        caller: &User,
        appointment_id: Uuid,
        patch: AppointmentPatch,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment: {}", appointment_id);

        if patch.is_empty() {
            return Err(AppointmentError::InvalidInput(
                "No fields to update".to_string(),
            ));
        }

        let current = self.get_appointment_detail(appointment_id, auth_token).await?;
        self.ensure_party(caller, &current)?;

        if let Some(new_status) = &patch.status {
            self.lifecycle
                .validate_status_transition(&current.appointment.status, new_status)?;
        }

        let notify_cancellation = self
            .lifecycle
            .crosses_into_cancellation(&current.appointment.status, patch.status.as_ref());

        let updated = self
            .apply_patch(appointment_id, &patch, auth_token)
            .await?;

        if notify_cancellation {
            self.notify_cancellation(&current).await;
        }

        info!("Appointment {} updated successfully", appointment_id);
        Ok(updated)
    }

    /// Cancel an appointment. Sugar over `update_appointment`, except that
    /// cancelling an already-cancelled row is reported distinctly.
    pub async fn cancel_appointment(
        &self,
        caller: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let current = self.get_appointment_detail(appointment_id, auth_token).await?;
        self.ensure_party(caller, &current)?;

        if current.appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        self.lifecycle
            .validate_status_transition(&current.appointment.status, &AppointmentStatus::Cancelled)?;

        let updated = self
            .apply_patch(appointment_id, &AppointmentPatch::cancellation(), auth_token)
            .await?;

        self.notify_cancellation(&current).await;

        info!("Appointment {} cancelled successfully", appointment_id);
        Ok(updated)
    }

    /// Appointments visible to the caller: a doctor sees their schedule, a
    /// patient their own bookings, an admin everything. Ordered by date
    /// descending then time ascending.
    pub async fn list_appointments(
        &self,
        caller: &User,
        auth_token: &str,
    ) -> Result<Vec<AppointmentDetail>, AppointmentError> {
        let mut query_parts = Vec::new();

        if !caller.is_admin() {
            let caller_id = parse_caller_id(caller)?;
            if caller.is_doctor() {
                query_parts.push(format!("doctor_id=eq.{}", caller_id));
            } else {
                query_parts.push(format!("patient_id=eq.{}", caller_id));
            }
        }

        query_parts.push(format!("select={}", urlencoding::encode(APPOINTMENT_DETAIL_SELECT)));
        query_parts.push("order=appointment_date.desc,appointment_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let appointments: Vec<AppointmentDetail> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(appointments)
    }

    /// Single appointment with both parties; only visible to the patient,
    /// the doctor, or an admin.
    pub async fn get_appointment(
        &self,
        caller: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentDetail, AppointmentError> {
        let detail = self.get_appointment_detail(appointment_id, auth_token).await?;
        self.ensure_party(caller, &detail)?;
        Ok(detail)
    }

    /// Counts by status: doctors over their own rows, admins over all rows.
    pub async fn get_appointment_stats(
        &self,
        caller: &User,
        auth_token: &str,
    ) -> Result<AppointmentStats, AppointmentError> {
        let mut query_parts = vec!["select=status".to_string()];

        if caller.is_doctor() {
            let caller_id = parse_caller_id(caller)?;
            query_parts.push(format!("doctor_id=eq.{}", caller_id));
        } else if !caller.is_admin() {
            return Err(AppointmentError::Forbidden);
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let rows: Vec<StatusRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let mut stats = AppointmentStats {
            total_appointments: rows.len() as i64,
            ..Default::default()
        };
        for row in rows {
            match row.status {
                AppointmentStatus::Scheduled => stats.scheduled += 1,
                AppointmentStatus::Confirmed => stats.confirmed += 1,
                AppointmentStatus::Completed => stats.completed += 1,
                AppointmentStatus::Cancelled => stats.cancelled += 1,
            }
        }

        Ok(stats)
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    fn resolve_patient(
        &self,
        caller: &User,
        requested: Option<Uuid>,
    ) -> Result<Uuid, AppointmentError> {
        match requested {
            Some(patient_id) if patient_id.to_string() != caller.id => {
                if caller.is_admin() || caller.is_doctor() {
                    Ok(patient_id)
                } else {
                    Err(AppointmentError::Forbidden)
                }
            }
            Some(patient_id) => Ok(patient_id),
            None => parse_caller_id(caller),
        }
    }

    fn ensure_party(
        &self,
        caller: &User,
        detail: &AppointmentDetail,
    ) -> Result<(), AppointmentError> {
        let is_patient = detail.appointment.patient_id.to_string() == caller.id;
        let is_doctor = detail.appointment.doctor_id.to_string() == caller.id;

        if is_patient || is_doctor || caller.is_admin() {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden)
        }
    }

    async fn get_appointment_detail(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentDetail, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&select={}",
            appointment_id,
            urlencoding::encode(APPOINTMENT_DETAIL_SELECT)
        );
        let rows: Vec<AppointmentDetail> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn check_slot_free(
        &self,
        doctor_id: Uuid,
        date: &str,
        time: &str,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&appointment_time=eq.{}&status=neq.cancelled&select=id",
            doctor_id,
            date,
            urlencoding::encode(time)
        );
        let occupied: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if occupied.is_empty() {
            Ok(())
        } else {
            Err(AppointmentError::SlotConflict)
        }
    }

    async fn apply_patch(
        &self,
        appointment_id: Uuid,
        patch: &AppointmentPatch,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut update_data = serde_json::Map::new();
        if let Some(status) = &patch.status {
            update_data.insert("status".to_string(), json!(status.to_string()));
        }
        if let Some(notes) = &patch.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn notify_cancellation(&self, detail: &AppointmentDetail) {
        let Some(email) = &detail.patient.email else {
            return;
        };

        self.dispatch(
            "cancellation",
            self.mailer.send_cancellation_notice(
                email,
                &detail.patient.full_name,
                &detail.doctor.full_name,
                detail.appointment.appointment_date,
                &detail.appointment.appointment_time,
            ),
        )
        .await;
    }

    /// The single best-effort boundary for notification dispatch: failures
    /// are logged and swallowed, never surfaced to the triggering
    /// operation.
    async fn dispatch<F>(&self, kind: &str, send: F)
    where
        F: Future<Output = Result<(), MailerError>>,
    {
        if let Err(e) = send.await {
            warn!("Failed to send {} notification: {}", kind, e);
        }
    }
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}

fn parse_caller_id(caller: &User) -> Result<Uuid, AppointmentError> {
    Uuid::parse_str(&caller.id)
        .map_err(|_| AppointmentError::InvalidInput("Caller id is not a valid uuid".to_string()))
}
