use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;
use crate::handlers::{policies, system, AppState};

/// Build the full router with global middleware.
pub fn app(state: AppState, api: &ApiConfig) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .merge(policy_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if api.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

fn policy_routes() -> Router<AppState> {
    Router::new()
        .route("/p_policies", get(policies::list))
        .route("/gp_policies/:policy_id", get(policies::get))
        .route("/up_policies/:policy_id", put(policies::update))
}
