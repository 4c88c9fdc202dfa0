use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{routing::get, Json, Router};
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use orderflow_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Collaborators
    let authorizer: Arc<dyn api::auth::Authorizer> = Arc::new(api::auth::RoleAuthorizer::new());
    let routing: Arc<dyn api::services::routing::RouteEstimator> =
        Arc::new(api::services::routing::HttpRoutingService::from_config(
            &cfg,
        ));

    let services = api::handlers::AppServices::build(
        db_arc.clone(),
        event_sender.clone(),
        authorizer.clone(),
        routing,
        &cfg,
    );

    let state = api::AppState {
        db: db_arc,
        config: cfg.clone(),
        event_sender,
        services,
        authorizer,
    };

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::handlers::workflow::workflow_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
