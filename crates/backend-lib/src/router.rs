// ============================
// identity-backend-lib/src/router.rs
// ============================
//! HTTP router.
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::users;
use crate::storage::IdentityStore;
use crate::AppState;

/// Create the application router
pub fn create_router<S: IdentityStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let users: Router<Arc<AppState<S>>> = Router::new()
        .route("/register", post(users::register::<S>))
        .route("/login", post(users::login::<S>))
        .route("/logout", post(users::logout::<S>))
        .route("/refresh-token", post(users::refresh_token::<S>))
        .route("/change-password", post(users::change_password::<S>))
        .route("/current-user", get(users::current_user))
        .route("/update-account", patch(users::update_account::<S>))
        .route("/avatar", patch(users::update_avatar::<S>))
        .route("/cover-image", patch(users::update_cover_image::<S>));

    let mut router = Router::new()
        .nest("/api/v1/users", users)
        .route("/health", get(health_handler));

    // Uploaded media is served locally unless URLs point at another host
    let media = &state.settings.media;
    let prefix = media.base_url.trim_end_matches('/');
    if prefix.starts_with('/') && prefix.len() > 1 {
        router = router.nest_service(prefix, ServeDir::new(&media.path));
    }

    router
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "Healthy"
}
