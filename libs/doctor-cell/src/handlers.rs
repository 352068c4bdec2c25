use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateDoctorProfileRequest, DoctorError, UpdateDoctorProfileRequest};
use crate::services::availability::AvailabilityService;
use crate::services::directory::DirectoryService;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
}

fn to_app_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::UserNotFound => AppError::NotFound("User not found".to_string()),
        DoctorError::NotADoctor => {
            AppError::BadRequest("User does not hold the doctor role".to_string())
        }
        DoctorError::ProfileExists => {
            AppError::BadRequest("Doctor profile already exists".to_string())
        }
        DoctorError::Forbidden => {
            AppError::Forbidden("Not authorized to manage this doctor profile".to_string())
        }
        DoctorError::InvalidInput(msg) => AppError::BadRequest(msg),
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_doctors(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);
    let doctors = directory.list_doctors().await.map_err(to_app_error)?;

    Ok(Json(json!({ "doctors": doctors })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);
    let doctor = directory.get_doctor(doctor_id).await.map_err(to_app_error)?;

    Ok(Json(json!({ "doctor": doctor })))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability = AvailabilityService::new(&state);
    let response = availability
        .doctor_availability(doctor_id, query.date, None)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn create_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);
    let profile = directory
        .create_profile(&user, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "Doctor profile created successfully",
        "doctor": profile
    })))
}

#[axum::debug_handler]
pub async fn update_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);
    let profile = directory
        .update_profile(&user, doctor_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "Doctor profile updated successfully",
        "doctor": profile
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);
    directory
        .delete_profile(&user, doctor_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "Doctor profile deleted successfully"
    })))
}
