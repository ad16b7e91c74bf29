use std::path::Path;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use handtally_core::shared::constants::MAX_IMAGE_BYTES;

use crate::recognize::recognize_handler;
use crate::state::AppState;

/// Build the application router: the recognition endpoint plus static
/// front-end serving, with unknown paths falling back to `index.html`.
pub fn create_app(state: AppState, static_dir: &Path) -> Router {
    let index = static_dir.join("index.html");
    let static_service = ServeDir::new(static_dir).fallback(ServeFile::new(index));

    Router::new()
        .route("/recognize", post(recognize_handler))
        .fallback_service(static_service)
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
