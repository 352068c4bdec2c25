use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One visit record in a patient's medical history. Written by the treating
/// doctor, readable by the patient, any doctor, or an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistoryEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub visit_date: NaiveDate,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub medications: Option<String>,
    pub vital_signs: Option<serde_json::Value>,
    pub lab_results: Option<String>,
    pub recommendations: Option<String>,
    pub next_visit_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryParty {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDoctorParty {
    pub full_name: String,
    #[serde(default)]
    pub profile: Option<HistoryDoctorProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDoctorProfile {
    pub specialty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistoryDetail {
    #[serde(flatten)]
    pub entry: MedicalHistoryEntry,
    pub patient: HistoryParty,
    pub doctor: HistoryDoctorParty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHistoryEntryRequest {
    pub appointment_id: Option<Uuid>,
    pub visit_date: NaiveDate,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub medications: Option<String>,
    pub vital_signs: Option<serde_json::Value>,
    pub lab_results: Option<String>,
    pub recommendations: Option<String>,
    pub next_visit_date: Option<NaiveDate>,
}

/// Enumerated history patch; only these fields can reach the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateHistoryEntryRequest {
    pub visit_date: Option<NaiveDate>,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub medications: Option<String>,
    pub vital_signs: Option<serde_json::Value>,
    pub lab_results: Option<String>,
    pub recommendations: Option<String>,
    pub next_visit_date: Option<NaiveDate>,
}

impl UpdateHistoryEntryRequest {
    pub fn is_empty(&self) -> bool {
        self.visit_date.is_none()
            && self.symptoms.is_none()
            && self.diagnosis.is_none()
            && self.treatment.is_none()
            && self.medications.is_none()
            && self.vital_signs.is_none()
            && self.lab_results.is_none()
            && self.recommendations.is_none()
            && self.next_visit_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum RecordsError {
    #[error("History entry not found")]
    NotFound,

    #[error("Unauthorized access to medical history")]
    Forbidden,

    #[error("Validation error: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),
}
