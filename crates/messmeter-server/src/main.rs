use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use messmeter_api::auth::{self, AppState, AppStateInner};
use messmeter_api::insights::AnalysisClient;
use messmeter_api::middleware::{require_admin, require_auth};
use messmeter_api::{attendance, feedback, insights, intents, rewards, settings};
use messmeter_core::config::PointsConfig;
use messmeter_gateway::connection;
use messmeter_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "messmeter=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MESSMETER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MESSMETER_DB_PATH").unwrap_or_else(|_| "messmeter.db".into());
    let host = std::env::var("MESSMETER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MESSMETER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let points = PointsConfig {
        attendance: env_points("MESSMETER_ATTENDANCE_POINTS", 5),
        streak_milestone: env_points("MESSMETER_MILESTONE_POINTS", 10),
        meal_review: env_points("MESSMETER_FEEDBACK_POINTS", 2),
    };

    // Init database
    let db = messmeter_db::Database::open(&PathBuf::from(&db_path))?;

    // Seed the admin account if configured
    match (
        std::env::var("MESSMETER_ADMIN_USERNAME"),
        std::env::var("MESSMETER_ADMIN_PASSWORD"),
    ) {
        (Ok(username), Ok(password)) => {
            let hash = auth::hash_password(&password)
                .map_err(|_| anyhow::anyhow!("failed to hash admin password"))?;
            let id = db.ensure_admin(&username, &hash)?;
            info!("Admin account '{}' ready ({})", username, id);
        }
        (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
            warn!("MESSMETER_ADMIN_USERNAME and MESSMETER_ADMIN_PASSWORD must both be set; skipping admin seed");
        }
        _ => {}
    }

    let analysis = match std::env::var("MESSMETER_ANALYSIS_URL") {
        Ok(url) => {
            info!("Analysis service configured at {}", url);
            Some(AnalysisClient::new(url))
        }
        Err(_) => {
            warn!("MESSMETER_ANALYSIS_URL not set; insight endpoints will be unavailable");
            None
        }
    };

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        points,
        dispatcher: dispatcher.clone(),
        analysis,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/intents", post(intents::set_intent))
        .route("/intents/today", get(intents::get_today))
        .route("/qr/self", get(attendance::self_qr))
        .route("/attendance/checkin", post(attendance::checkin))
        .route("/points/transactions", get(rewards::transactions))
        .route("/leaderboard", get(rewards::leaderboard))
        .route("/rewards/redeem", post(rewards::redeem))
        .route("/feedback", post(feedback::submit))
        .route("/settings/meal-times", get(settings::get_settings))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state.clone());

    let admin_routes = Router::new()
        .route("/admin/qr/{meal}", get(attendance::admin_qr))
        .route("/admin/qr/{meal}/refresh", post(attendance::refresh_admin_qr))
        .route("/admin/attendance/scan", post(attendance::scan))
        .route("/admin/attendance/{date}", get(attendance::list_for_date))
        .route("/admin/intents/{date}", get(intents::counts))
        .route("/admin/settings/meal-times", put(settings::put_settings))
        .route("/admin/feedback", get(feedback::list))
        .route(
            "/admin/insights/weekly",
            get(insights::get_weekly).post(insights::generate_weekly),
        )
        .route("/admin/analyze-plate", post(insights::analyze_plate))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Messmeter server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_points(var: &str, default: i64) -> i64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}
