use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Method;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use appointment_cell::models::{AppointmentDetail, APPOINTMENT_DETAIL_SELECT};
use notification_cell::MailerService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("A reminder sweep is already in progress")]
    AlreadyRunning,

    #[error("Database error: {0}")]
    Database(String),
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Once a day, remind every patient with an active appointment tomorrow.
/// The sweep only reads appointment state; a failed send is logged and the
/// sweep moves on to the next row.
pub struct ReminderSweepService {
    supabase: Arc<SupabaseClient>,
    mailer: Arc<MailerService>,
    service_key: String,
    sweep_hour: u32,
    in_flight: Mutex<()>,
}

impl ReminderSweepService {
    pub fn new(config: &AppConfig, mailer: Arc<MailerService>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            mailer,
            service_key: config.supabase_service_role_key.clone(),
            sweep_hour: config.reminder_hour,
            in_flight: Mutex::new(()),
        }
    }

    /// Long-running loop driving the daily trigger. Spawned once at
    /// startup.
    pub async fn run_loop(self: Arc<Self>) {
        info!("Reminder sweep scheduled daily at {:02}:00", self.sweep_hour);

        loop {
            let now = Local::now().naive_local();
            let next = next_run_from(now, self.sweep_hour);
            let wait = (next - now)
                .to_std()
                .unwrap_or_else(|_| std::time::Duration::from_secs(60));

            tokio::time::sleep(wait).await;

            match self.run_once().await {
                Ok(report) => info!(
                    "Reminder sweep sent {} of {} reminders ({} failed)",
                    report.sent, report.scanned, report.failed
                ),
                Err(ReminderError::AlreadyRunning) => {
                    warn!("Previous reminder sweep still in flight, skipping this run")
                }
                Err(e) => error!("Reminder sweep failed: {}", e),
            }
        }
    }

    /// One sweep over tomorrow's schedule. Overlapping triggers are
    /// skipped rather than run concurrently.
    pub async fn run_once(&self) -> Result<SweepReport, ReminderError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| ReminderError::AlreadyRunning)?;

        let tomorrow = Local::now().date_naive() + ChronoDuration::days(1);
        self.remind_for_date(tomorrow).await
    }

    /// Send reminders for every active appointment on `date`,
    /// sequentially.
    pub async fn remind_for_date(&self, date: NaiveDate) -> Result<SweepReport, ReminderError> {
        let path = format!(
            "/rest/v1/appointments?appointment_date=eq.{}&status=in.(scheduled,confirmed)&select={}",
            date,
            urlencoding::encode(APPOINTMENT_DETAIL_SELECT)
        );
        let mut upcoming: Vec<AppointmentDetail> = self
            .supabase
            .request(Method::GET, &path, Some(&self.service_key), None)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;

        upcoming.retain(|a| a.appointment.status.is_active());

        let mut report = SweepReport {
            scanned: upcoming.len(),
            ..Default::default()
        };

        for detail in &upcoming {
            let Some(email) = &detail.patient.email else {
                warn!(
                    "No patient email on appointment {}, skipping reminder",
                    detail.appointment.id
                );
                report.failed += 1;
                continue;
            };

            let specialty = detail
                .doctor
                .profile
                .as_ref()
                .map(|p| p.specialty.as_str())
                .unwrap_or("General");

            match self
                .mailer
                .send_reminder(
                    email,
                    &detail.patient.full_name,
                    &detail.doctor.full_name,
                    detail.appointment.appointment_date,
                    &detail.appointment.appointment_time,
                    specialty,
                )
                .await
            {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(
                        "Failed to send reminder for appointment {}: {}",
                        detail.appointment.id, e
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Next wall-clock instant at `sweep_hour` strictly after `now`.
pub fn next_run_from(now: NaiveDateTime, sweep_hour: u32) -> NaiveDateTime {
    let at = NaiveTime::from_hms_opt(sweep_hour.min(23), 0, 0).unwrap_or_default();
    let today = now.date().and_time(at);

    if now < today {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}
