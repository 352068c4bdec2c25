use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentError, AppointmentPatch, BookAppointmentRequest};
use crate::services::booking::AppointmentBookingService;
use crate::SchedulingState;

fn to_app_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        AppointmentError::Forbidden => {
            AppError::Forbidden("Not authorized to access this appointment".to_string())
        }
        AppointmentError::InvalidInput(msg) => AppError::BadRequest(msg),
        AppointmentError::SlotUnavailable => AppError::BadRequest(
            "The selected time is not available for this doctor".to_string(),
        ),
        AppointmentError::SlotConflict => {
            AppError::Conflict("The selected time is already taken".to_string())
        }
        AppointmentError::PastDate => {
            AppError::BadRequest("Appointments cannot be scheduled in the past".to_string())
        }
        AppointmentError::AlreadyCancelled => {
            AppError::BadRequest("Appointment is already cancelled".to_string())
        }
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}

fn booking_service(state: &SchedulingState) -> AppointmentBookingService {
    AppointmentBookingService::new(&state.config, state.mailer.clone())
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<SchedulingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = booking_service(&state)
        .book_appointment(&user, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "Appointment booked successfully",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<SchedulingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = booking_service(&state)
        .list_appointments(&user, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = booking_service(&state)
        .get_appointment(&user, appointment_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(patch): Json<AppointmentPatch>,
) -> Result<Json<Value>, AppError> {
    let appointment = booking_service(&state)
        .update_appointment(&user, appointment_id, patch, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "Appointment updated successfully",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    booking_service(&state)
        .cancel_appointment(&user, appointment_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<SchedulingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let stats = booking_service(&state)
        .get_appointment_stats(&user, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "stats": stats })))
}
