use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    /// Literal "HH:MM" value drawn from the doctor's published hours at
    /// booking time.
    pub appointment_time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Statuses that still occupy their slot and receive reminders.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Omitted for self-booking; privileged callers may book on behalf of a
    /// patient by setting it.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub notes: Option<String>,
}

/// Enumerated appointment patch. Only these fields ever reach the store;
/// caller-supplied keys are never forwarded into a write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentPatch {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.notes.is_none()
    }

    pub fn cancellation() -> Self {
        Self {
            status: Some(AppointmentStatus::Cancelled),
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyInfo {
    pub full_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorPartyInfo {
    pub full_name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub profile: Option<DoctorProfileInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfileInfo {
    pub specialty: String,
    pub consultation_fee: f64,
    pub phone: Option<String>,
}

/// PostgREST embedding that produces an `AppointmentDetail` row.
pub const APPOINTMENT_DETAIL_SELECT: &str = "*,\
patient:users!appointments_patient_id_fkey(full_name,email),\
doctor:users!appointments_doctor_id_fkey(full_name,email,\
profile:doctors(specialty,consultation_fee,phone))";

/// An appointment enriched with both parties, as listings and single reads
/// return it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: PartyInfo,
    pub doctor: DoctorPartyInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub total_appointments: i64,
    pub scheduled: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Unauthorized access to appointment")]
    Forbidden,

    #[error("Validation error: {0}")]
    InvalidInput(String),

    #[error("Requested time is not in the doctor's published hours")]
    SlotUnavailable,

    #[error("A non-cancelled appointment already occupies this slot")]
    SlotConflict,

    #[error("Appointments cannot be scheduled in the past")]
    PastDate,

    #[error("Appointment is already cancelled")]
    AlreadyCancelled,

    #[error("Database error: {0}")]
    Database(String),
}
