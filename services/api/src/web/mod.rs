pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub use auth::{login_handler, logout_handler, register_handler};
pub use middleware::require_auth;
pub use rest::{
    balance_handler, list_orders_handler, list_withdrawals_handler, submit_order_handler,
    withdraw_handler,
};
pub use state::{AppState, AuthUser};

/// Builds the `/api/user` router with access logging and gzip compression.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/user/register", post(register_handler))
        .route("/api/user/login", post(login_handler))
        .route("/api/user/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/api/user/orders",
            post(submit_order_handler).get(list_orders_handler),
        )
        .route("/api/user/balance", get(balance_handler))
        .route("/api/user/balance/withdraw", post(withdraw_handler))
        .route("/api/user/withdrawals", get(list_withdrawals_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
