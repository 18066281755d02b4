//! Route definitions for the Mill Costing Platform

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/costings", costing_routes())
        .nest("/ledger", ledger_routes())
}

/// Costing record routes
fn costing_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_costings).post(handlers::create_costing),
        )
        .route("/calculate", post(handlers::calculate_costing))
        .route(
            "/:costing_id",
            get(handlers::get_costing)
                .put(handlers::update_costing)
                .delete(handlers::delete_costing),
        )
        .route("/:costing_id/draft", patch(handlers::save_draft))
        .route("/:costing_id/flush", post(handlers::flush_costing))
}

/// Stateless supplier ledger routes
fn ledger_routes() -> Router<AppState> {
    Router::new().route(
        "/supplier-entries/calculate",
        post(handlers::calculate_ledger_entry),
    )
}
