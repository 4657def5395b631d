pub mod error;
pub mod routes;
pub mod session;
pub mod state;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // User routes (provisioning glue)
    let user_routes = Router::new()
        .route("/", post(routes::user::create))
        .route("/{user_id}", get(routes::user::get));

    // Room routes
    let room_routes = Router::new()
        .route("/", post(routes::room::create))
        .route("/{room_id}", get(routes::room::get))
        .route("/{room_id}/invite", post(routes::room::invite));

    // Compose API
    let api = Router::new()
        .nest("/user", user_routes)
        .nest("/room", room_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
