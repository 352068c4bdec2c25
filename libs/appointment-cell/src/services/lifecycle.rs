use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed. Writing the current
    /// status back is accepted as a no-op.
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current_status, new_status);

        if new_status == current_status {
            return Ok(());
        }

        if !self.valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidInput(format!(
                "Cannot transition appointment from {} to {}",
                current_status, new_status
            )));
        }

        Ok(())
    }

    /// All valid next statuses for a given current status.
    pub fn valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // A completed visit may still be cancelled (e.g. recorded in
            // error); re-opening a terminal appointment is not exposed.
            AppointmentStatus::Completed => vec![AppointmentStatus::Cancelled],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Whether applying `new_status` to a row currently in `current_status`
    /// crosses into cancellation for the first time. Drives the single
    /// cancellation notice.
    pub fn crosses_into_cancellation(
        &self,
        current_status: &AppointmentStatus,
        new_status: Option<&AppointmentStatus>,
    ) -> bool {
        matches!(new_status, Some(AppointmentStatus::Cancelled))
            && *current_status != AppointmentStatus::Cancelled
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
