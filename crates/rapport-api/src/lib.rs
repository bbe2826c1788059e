pub mod clock;
pub mod error;
pub mod interactions;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};

pub use state::{AppState, AppStateInner};

/// All application routes. Cross-cutting layers (CORS, tracing) are added by
/// the server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/app/report", post(interactions::report))
        .route("/app/like", post(interactions::like))
        .route("/app/dislike", post(interactions::dislike))
        .route(
            "/app/user/{user_id}/interactions/{direction}",
            get(interactions::user_interactions),
        )
        .route("/health", get(interactions::health))
        .with_state(state)
}
