use std::sync::Arc;

use notification_cell::MailerService;
use shared_config::AppConfig;

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use services::booking::AppointmentBookingService;
pub use services::lifecycle::AppointmentLifecycleService;

/// State shared by the scheduling routes: configuration plus the mailer
/// instance constructed at startup and injected here.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub mailer: Arc<MailerService>,
}
