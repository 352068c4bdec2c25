use std::collections::HashSet;

use chrono::NaiveDate;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{DoctorAvailabilityResponse, DoctorError};

#[derive(Debug, Deserialize)]
struct BookedSlot {
    appointment_time: String,
}

#[derive(Debug, Deserialize)]
struct PublishedHours {
    available_hours: Vec<String>,
}

/// Answers "when can this doctor be booked". Without a date the answer is
/// the doctor's raw published hours; with a date it is those hours minus
/// the times already taken by non-cancelled appointments, in published
/// order.
pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn doctor_availability(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
        auth_token: Option<&str>,
    ) -> Result<DoctorAvailabilityResponse, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?user_id=eq.{}&select=available_hours",
            doctor_id
        );
        let rows: Vec<PublishedHours> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let published = rows
            .into_iter()
            .next()
            .ok_or(DoctorError::NotFound)?
            .available_hours;

        let Some(date) = date else {
            return Ok(DoctorAvailabilityResponse {
                doctor_id,
                date: None,
                available_hours: published,
                booked_times: None,
            });
        };

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=neq.cancelled&select=appointment_time",
            doctor_id, date
        );
        let booked_rows: Vec<BookedSlot> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let booked: Vec<String> = booked_rows.into_iter().map(|b| b.appointment_time).collect();
        let taken: HashSet<&str> = booked.iter().map(String::as_str).collect();

        // Set difference over the published hours, keeping their order and
        // dropping duplicate entries.
        let mut seen = HashSet::new();
        let free: Vec<String> = published
            .into_iter()
            .filter(|hour| !taken.contains(hour.as_str()) && seen.insert(hour.clone()))
            .collect();

        debug!(
            "Doctor {} has {} free of {} booked slots on {}",
            doctor_id,
            free.len(),
            taken.len(),
            date
        );

        Ok(DoctorAvailabilityResponse {
            doctor_id,
            date: Some(date),
            available_hours: free,
            booked_times: Some(booked),
        })
    }
}
