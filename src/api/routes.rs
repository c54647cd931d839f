//! HTTP route wiring and server startup.

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{auth, points, tasks};
use super::types::{ApiResponse, HealthResponse};
use crate::config::Config;
use crate::roles::Role;
use crate::store::Store;
use crate::workflow::Workflow;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub workflow: Arc<Workflow>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(Store::open(&config.database_path)?);
    seed_admin_if_empty(&store, &config).await?;

    let workflow = Arc::new(Workflow::new(Arc::clone(&store)));

    // Drain transition events for external notifiers. Delivery beyond this
    // feed is someone else's job; we log what went out.
    {
        let mut events = workflow.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                tracing::debug!(
                    task_id = event.task_id,
                    action = %event.action,
                    to = %event.to,
                    "transition event published"
                );
            }
        });
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        workflow,
    });

    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/:id", get(tasks::get))
        .route("/api/tasks/:id/:action", post(tasks::act))
        .route("/api/points/history", get(points::history))
        .route("/api/points/leaderboard", get(points::leaderboard))
        .route("/api/points/stats", get(points::my_stats))
        .route("/api/points/adjust", post(points::adjust))
        .route("/api/points/correct", post(points::correct))
        .route("/api/users/:id/stats", get(points::user_stats))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// First run on an empty database: create the initial advisor account so
/// someone can log in and manage the household.
async fn seed_admin_if_empty(store: &Arc<Store>, config: &Config) -> anyhow::Result<()> {
    if store.user_count().await? > 0 {
        return Ok(());
    }
    let Some(password) = config.auth.bootstrap_admin_password.as_deref() else {
        tracing::warn!(
            "user table is empty and FAMILYBOARD_ADMIN_PASSWORD is unset; \
             no advisor account seeded"
        );
        return Ok(());
    };
    let salt = auth::generate_salt();
    let hash = auth::hash_password(password, &salt);
    let user = store
        .create_user("admin", "admin@familyboard.local", Role::Advisor, &hash, &salt)
        .await?;
    tracing::info!(user_id = user.id, "seeded initial advisor account 'admin'");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(_state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
