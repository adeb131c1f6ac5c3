pub mod health;
pub mod runs;
pub mod sessions;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", axum::routing::get(health::health))
        .nest("/sessions", sessions::router())
        .nest("/runs", runs::router())
}
