use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notification_cell::MailerService;
use reminder_cell::ReminderSweepService;
use shared_config::AppConfig;

mod router;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Medbook API server");

    let config = Arc::new(AppConfig::from_env());

    // The mailer is constructed once here and injected everywhere sends
    // happen. A failed probe downgrades notifications to no-ops but never
    // blocks boot.
    let mailer = Arc::new(MailerService::new(&config));
    match mailer.verify().await {
        Ok(()) => info!("Mail service ready"),
        Err(e) => warn!("Mail service unavailable, notifications degraded: {}", e),
    }

    let sweep = Arc::new(ReminderSweepService::new(&config, mailer.clone()));
    tokio::spawn(sweep.run_loop());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), mailer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
