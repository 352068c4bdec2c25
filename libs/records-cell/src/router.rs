use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn records_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/patient/{patient_id}", get(handlers::get_patient_history))
        .route("/patient/{patient_id}", post(handlers::create_history_entry))
        .route("/{history_id}", put(handlers::update_history_entry))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
