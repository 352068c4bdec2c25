use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    CreateHistoryEntryRequest, MedicalHistoryDetail, MedicalHistoryEntry, RecordsError,
    UpdateHistoryEntryRequest,
};

const DETAIL_SELECT: &str = "*,\
patient:users!patient_medical_history_patient_id_fkey(full_name),\
doctor:users!patient_medical_history_doctor_id_fkey(full_name,profile:doctors(specialty))";

pub struct MedicalHistoryService {
    supabase: SupabaseClient,
}

impl MedicalHistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// History entries for a patient, newest visit first. Visible to the
    /// patient themself, any doctor, or an admin.
    pub async fn list_for_patient(
        &self,
        caller: &User,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<MedicalHistoryDetail>, RecordsError> {
        if !caller.is_doctor() && !caller.is_admin() && caller.id != patient_id.to_string() {
            return Err(RecordsError::Forbidden);
        }

        let path = format!(
            "/rest/v1/patient_medical_history?patient_id=eq.{}&select={}&order=visit_date.desc",
            patient_id,
            urlencoding::encode(DETAIL_SELECT)
        );
        let entries: Vec<MedicalHistoryDetail> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| RecordsError::Database(e.to_string()))?;

        Ok(entries)
    }

    /// Record a visit. The authoring doctor is always the caller.
    pub async fn create_entry(
        &self,
        caller: &User,
        patient_id: Uuid,
        request: CreateHistoryEntryRequest,
        auth_token: &str,
    ) -> Result<MedicalHistoryEntry, RecordsError> {
        if !caller.is_doctor() && !caller.is_admin() {
            return Err(RecordsError::Forbidden);
        }

        let doctor_id = Uuid::parse_str(&caller.id)
            .map_err(|_| RecordsError::InvalidInput("Caller id is not a valid uuid".to_string()))?;

        let now = Utc::now();
        let entry_data = json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_id": request.appointment_id,
            "visit_date": request.visit_date,
            "symptoms": request.symptoms,
            "diagnosis": request.diagnosis,
            "treatment": request.treatment,
            "medications": request.medications,
            "vital_signs": request.vital_signs,
            "lab_results": request.lab_results,
            "recommendations": request.recommendations,
            "next_visit_date": request.next_visit_date,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let rows: Vec<MedicalHistoryEntry> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patient_medical_history",
                Some(auth_token),
                Some(entry_data),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| RecordsError::Database(e.to_string()))?;

        let entry = rows
            .into_iter()
            .next()
            .ok_or_else(|| RecordsError::Database("Failed to create history entry".to_string()))?;

        info!(
            "Medical history entry {} recorded for patient {}",
            entry.id, patient_id
        );
        Ok(entry)
    }

    /// Amend an entry. Only the authoring doctor or an admin may edit.
    pub async fn update_entry(
        &self,
        caller: &User,
        history_id: Uuid,
        request: UpdateHistoryEntryRequest,
        auth_token: &str,
    ) -> Result<MedicalHistoryEntry, RecordsError> {
        if !caller.is_doctor() && !caller.is_admin() {
            return Err(RecordsError::Forbidden);
        }

        if request.is_empty() {
            return Err(RecordsError::InvalidInput("No fields to update".to_string()));
        }

        if !caller.is_admin() {
            let current = self.get_entry(history_id, auth_token).await?;
            if current.doctor_id.to_string() != caller.id {
                return Err(RecordsError::Forbidden);
            }
        }

        let mut update_data = serde_json::Map::new();
        if let Some(visit_date) = request.visit_date {
            update_data.insert("visit_date".to_string(), json!(visit_date));
        }
        if let Some(symptoms) = request.symptoms {
            update_data.insert("symptoms".to_string(), json!(symptoms));
        }
        if let Some(diagnosis) = request.diagnosis {
            update_data.insert("diagnosis".to_string(), json!(diagnosis));
        }
        if let Some(treatment) = request.treatment {
            update_data.insert("treatment".to_string(), json!(treatment));
        }
        if let Some(medications) = request.medications {
            update_data.insert("medications".to_string(), json!(medications));
        }
        if let Some(vital_signs) = request.vital_signs {
            update_data.insert("vital_signs".to_string(), json!(vital_signs));
        }
        if let Some(lab_results) = request.lab_results {
            update_data.insert("lab_results".to_string(), json!(lab_results));
        }
        if let Some(recommendations) = request.recommendations {
            update_data.insert("recommendations".to_string(), json!(recommendations));
        }
        if let Some(next_visit_date) = request.next_visit_date {
            update_data.insert("next_visit_date".to_string(), json!(next_visit_date));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patient_medical_history?id=eq.{}", history_id);
        let rows: Vec<MedicalHistoryEntry> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| RecordsError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(RecordsError::NotFound)
    }

    async fn get_entry(
        &self,
        history_id: Uuid,
        auth_token: &str,
    ) -> Result<MedicalHistoryEntry, RecordsError> {
        debug!("Fetching history entry: {}", history_id);

        let path = format!("/rest/v1/patient_medical_history?id=eq.{}", history_id);
        let rows: Vec<MedicalHistoryEntry> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| RecordsError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(RecordsError::NotFound)
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
