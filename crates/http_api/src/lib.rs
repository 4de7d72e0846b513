mod errors;
mod handlers;
mod middleware;
mod rate_limit;
mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use rate_limit::{
    CounterStore, InMemoryCounterStore, RateLimitConfig, RateLimiter, RouteLimit,
};
pub use state::{HttpState, SessionUser, SessionValidator, StaticTokenValidator, generate_api_token};

pub fn router(state: HttpState) -> Router<()> {
    let api = Router::new()
        .route("/records_upsert", post(handlers::records_upsert))
        .route("/records_get", post(handlers::records_get))
        .route("/records_list", post(handlers::records_list))
        .route("/records_delete", post(handlers::records_delete))
        .route("/events_ingest", post(handlers::events_ingest))
        .route("/metrics_summary", post(handlers::metrics_summary))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::track_metrics,
        ));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .with_state(state)
}
