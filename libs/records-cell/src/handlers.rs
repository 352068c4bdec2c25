use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateHistoryEntryRequest, RecordsError, UpdateHistoryEntryRequest};
use crate::services::history::MedicalHistoryService;

fn to_app_error(e: RecordsError) -> AppError {
    match e {
        RecordsError::NotFound => AppError::NotFound("History entry not found".to_string()),
        RecordsError::Forbidden => {
            AppError::Forbidden("Not authorized to access this medical history".to_string())
        }
        RecordsError::InvalidInput(msg) => AppError::BadRequest(msg),
        RecordsError::Database(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn get_patient_history(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = MedicalHistoryService::new(&state);
    let entries = service
        .list_for_patient(&user, patient_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "history": entries })))
}

#[axum::debug_handler]
pub async fn create_history_entry(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateHistoryEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let service = MedicalHistoryService::new(&state);
    let entry = service
        .create_entry(&user, patient_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "History entry recorded successfully",
        "entry": entry
    })))
}

#[axum::debug_handler]
pub async fn update_history_entry(
    State(state): State<Arc<AppConfig>>,
    Path(history_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateHistoryEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let service = MedicalHistoryService::new(&state);
    let entry = service
        .update_entry(&user, history_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "History entry updated successfully",
        "entry": entry
    })))
}
