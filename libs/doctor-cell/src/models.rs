use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user row as stored in the directory. Read-only from this cell's
/// perspective; account management lives with the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl DirectoryUser {
    pub fn is_doctor(&self) -> bool {
        self.role == "doctor"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub user_id: Uuid,
    pub specialty: String,
    pub license_number: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub consultation_fee: f64,
    /// Ordered set of bookable "HH:MM" times published by the doctor.
    pub available_hours: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Doctor identity joined with the profile, as returned by the public
/// listing endpoints. `profile` is absent for doctor accounts that have not
/// completed profile setup yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorListing {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub profile: Option<DoctorProfileSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfileSummary {
    pub specialty: String,
    pub license_number: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub consultation_fee: f64,
    pub available_hours: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorProfileRequest {
    /// Admins may create a profile for any doctor account; other callers
    /// always create their own and this field is ignored.
    pub user_id: Option<Uuid>,
    pub specialty: String,
    pub license_number: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub consultation_fee: f64,
    pub available_hours: Vec<String>,
}

/// Enumerated profile patch. Only these fields can reach the store; caller
/// payload keys are never forwarded verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub consultation_fee: Option<f64>,
    pub available_hours: Option<Vec<String>>,
}

impl UpdateDoctorProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.specialty.is_none()
            && self.license_number.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.consultation_fee.is_none()
            && self.available_hours.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailabilityResponse {
    pub doctor_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Raw published hours when no date is given; the free remainder of
    /// them when a date is given.
    pub available_hours: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_times: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("User does not hold the doctor role")]
    NotADoctor,

    #[error("Doctor profile already exists")]
    ProfileExists,

    #[error("Unauthorized access to doctor profile")]
    Forbidden,

    #[error("Validation error: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),
}
