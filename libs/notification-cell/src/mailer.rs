use chrono::NaiveDate;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::templates;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Mail service is not configured")]
    NotConfigured,

    #[error("Mail service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Outbound notification client. Constructed once at startup and injected
/// where sends are triggered; never reached through global state. Delivery
/// is best-effort from the caller's perspective: callers decide whether an
/// `Err` aborts anything, and the scheduling engine never lets it.
pub struct MailerService {
    client: Client,
    api_url: String,
    api_key: String,
    from_address: String,
    from_name: String,
}

impl MailerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from_address: config.mail_from_address.clone(),
            from_name: config.mail_from_name.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.from_address.is_empty()
    }

    /// Probe the mail API. Called once at startup; a failure is reported to
    /// the caller but must never prevent the service from booting.
    pub async fn verify(&self) -> Result<(), MailerError> {
        if !self.is_configured() {
            return Err(MailerError::NotConfigured);
        }

        let url = format!("{}/health", self.api_url);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Service {
                status: status.as_u16(),
                body,
            });
        }

        info!("Mail service verified at {}", self.api_url);
        Ok(())
    }

    pub async fn send_booking_confirmation(
        &self,
        to: &str,
        patient_name: &str,
        doctor_name: &str,
        date: NaiveDate,
        time: &str,
        specialty: &str,
    ) -> Result<(), MailerError> {
        let body = templates::booking_confirmation_body(patient_name, doctor_name, date, time, specialty);
        self.deliver(to, "Your appointment is confirmed", body).await
    }

    pub async fn send_cancellation_notice(
        &self,
        to: &str,
        patient_name: &str,
        doctor_name: &str,
        date: NaiveDate,
        time: &str,
    ) -> Result<(), MailerError> {
        let body = templates::cancellation_notice_body(patient_name, doctor_name, date, time);
        self.deliver(to, "Your appointment was cancelled", body).await
    }

    pub async fn send_reminder(
        &self,
        to: &str,
        patient_name: &str,
        doctor_name: &str,
        date: NaiveDate,
        time: &str,
        specialty: &str,
    ) -> Result<(), MailerError> {
        let body = templates::reminder_body(patient_name, doctor_name, date, time, specialty);
        self.deliver(to, "Reminder: your appointment is tomorrow", body)
            .await
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.api_key.is_empty() {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }
        headers
    }

    async fn deliver(&self, to: &str, subject: &str, html: String) -> Result<(), MailerError> {
        if !self.is_configured() {
            return Err(MailerError::NotConfigured);
        }

        let payload = json!({
            "from": format!("{} <{}>", self.from_name, self.from_address),
            "to": to,
            "subject": subject,
            "html": html,
        });

        let url = format!("{}/messages", self.api_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Service {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Sent \"{}\" to {}", subject, to);
        Ok(())
    }
}
