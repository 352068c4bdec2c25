use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use appointment_cell::SchedulingState;
use doctor_cell::router::doctor_routes;
use notification_cell::MailerService;
use records_cell::router::records_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, mailer: Arc<MailerService>) -> Router {
    let scheduling_state = SchedulingState {
        config: config.clone(),
        mailer,
    };

    Router::new()
        .route("/", get(|| async { "Medbook API is running!" }))
        .nest("/doctors", doctor_routes(config.clone()))
        .nest("/appointments", appointment_routes(scheduling_state))
        .nest("/records", records_routes(config))
}
