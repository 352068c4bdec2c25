use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    CreateDoctorProfileRequest, DirectoryUser, DoctorError, DoctorListing, DoctorProfile,
    UpdateDoctorProfileRequest,
};

const LISTING_SELECT: &str = "id,full_name,email,created_at,\
profile:doctors(specialty,license_number,phone,address,consultation_fee,available_hours)";

/// Read and manage the user directory: user identities, doctor profiles and
/// their published hours. Users themselves are owned by the auth provider;
/// this service only ever writes to the doctors table.
pub struct DirectoryService {
    supabase: SupabaseClient,
}

impl DirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_user_by_id(
        &self,
        user_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<DirectoryUser>, DoctorError> {
        let path = format!(
            "/rest/v1/users?id=eq.{}&select=id,full_name,email,role,created_at",
            user_id
        );
        let rows: Vec<DirectoryUser> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    pub async fn find_doctor_profile(
        &self,
        user_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<DoctorProfile>, DoctorError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let rows: Vec<DoctorProfile> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    /// Public doctor listing: every doctor account joined with its profile,
    /// ordered by name.
    pub async fn list_doctors(&self) -> Result<Vec<DoctorListing>, DoctorError> {
        let path = format!(
            "/rest/v1/users?role=eq.doctor&select={}&order=full_name.asc",
            urlencoding::encode(LISTING_SELECT)
        );
        let doctors: Vec<DoctorListing> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(doctors)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<DoctorListing, DoctorError> {
        let path = format!(
            "/rest/v1/users?id=eq.{}&role=eq.doctor&select={}",
            doctor_id,
            urlencoding::encode(LISTING_SELECT)
        );
        let rows: Vec<DoctorListing> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(DoctorError::NotFound)
    }

    pub async fn create_profile(
        &self,
        caller: &User,
        request: CreateDoctorProfileRequest,
        auth_token: &str,
    ) -> Result<DoctorProfile, DoctorError> {
        if !caller.is_admin() && !caller.is_doctor() {
            return Err(DoctorError::Forbidden);
        }

        let target_id = if caller.is_admin() {
            request
                .user_id
                .ok_or_else(|| DoctorError::InvalidInput("user_id is required".to_string()))?
        } else {
            parse_caller_id(caller)?
        };

        validate_hours(&request.available_hours)?;

        let user = self
            .find_user_by_id(target_id, Some(auth_token))
            .await?
            .ok_or(DoctorError::UserNotFound)?;
        if !user.is_doctor() {
            return Err(DoctorError::NotADoctor);
        }

        if self
            .find_doctor_profile(target_id, Some(auth_token))
            .await?
            .is_some()
        {
            return Err(DoctorError::ProfileExists);
        }

        let now = Utc::now();
        let profile_data = json!({
            "user_id": target_id,
            "specialty": request.specialty,
            "license_number": request.license_number,
            "phone": request.phone,
            "address": request.address,
            "consultation_fee": request.consultation_fee,
            "available_hours": request.available_hours,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let rows: Vec<DoctorProfile> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors",
                Some(auth_token),
                Some(profile_data),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let profile = rows
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::Database("Failed to create doctor profile".to_string()))?;

        info!("Doctor profile created for user {}", target_id);
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        caller: &User,
        doctor_id: Uuid,
        request: UpdateDoctorProfileRequest,
        auth_token: &str,
    ) -> Result<DoctorProfile, DoctorError> {
        if !caller.is_admin() && caller.id != doctor_id.to_string() {
            return Err(DoctorError::Forbidden);
        }

        if request.is_empty() {
            return Err(DoctorError::InvalidInput(
                "No fields to update".to_string(),
            ));
        }

        if let Some(hours) = &request.available_hours {
            validate_hours(hours)?;
        }

        let mut update_data = serde_json::Map::new();
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(license_number) = request.license_number {
            update_data.insert("license_number".to_string(), json!(license_number));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(fee) = request.consultation_fee {
            update_data.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(hours) = request.available_hours {
            update_data.insert("available_hours".to_string(), json!(hours));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?user_id=eq.{}", doctor_id);
        let rows: Vec<DoctorProfile> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(DoctorError::NotFound)
    }

    pub async fn delete_profile(
        &self,
        caller: &User,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        if !caller.is_admin() {
            return Err(DoctorError::Forbidden);
        }

        debug!("Deleting doctor profile for user {}", doctor_id);

        let path = format!("/rest/v1/doctors?user_id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(auth_token),
                None,
                Some(representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        if rows.is_empty() {
            return Err(DoctorError::NotFound);
        }

        Ok(())
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

fn parse_caller_id(caller: &User) -> Result<Uuid, DoctorError> {
    Uuid::parse_str(&caller.id)
        .map_err(|_| DoctorError::InvalidInput("Caller id is not a valid uuid".to_string()))
}

fn validate_hours(hours: &[String]) -> Result<(), DoctorError> {
    for hour in hours {
        if NaiveTime::parse_from_str(hour, "%H:%M").is_err() {
            return Err(DoctorError::InvalidInput(format!(
                "Invalid time of day: {}",
                hour
            )));
        }
    }
    Ok(())
}
