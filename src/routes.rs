use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::account;
use crate::config::AppConfig;
use crate::listing;
use crate::session;
use crate::shared::AppState;

/// Builds the HTTP surface.
///
/// Routes under `/api/{role}` exist for both `user` and `admin`. The update,
/// logout and me routes sit behind the session middleware, as does everything
/// on listings except browsing, search and view counting.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/:role/register", post(account::register))
        .route("/api/:role/login", post(account::login))
        .route("/api/:role/forgot-password", post(account::forgot_password))
        .route("/api/:role/verify/:email/:code", get(account::verify_email))
        .route("/api/listing", get(listing::all_listings))
        .route("/api/listing/search", get(listing::search_listings))
        .route("/api/listings/:id/views", get(listing::record_view));

    let authenticated = Router::new()
        .route("/api/:role/update", put(account::update_account))
        .route("/api/:role/logout", post(account::logout))
        .route("/api/:role/me", get(account::me))
        .route("/api/listing/user", get(listing::user_listings))
        .route("/api/listing/create", post(listing::create_listing))
        .route("/api/listing/:id", get(listing::get_listing))
        .route("/api/listing/admin/listing", get(listing::admin_listings))
        .route(
            "/api/listing/admin/listing/:id",
            get(listing::admin_listing).delete(listing::delete_listing),
        )
        .route(
            "/api/listing/admin/listing/:id/reviews",
            get(listing::admin_listing_reviews),
        )
        .route(
            "/api/listing/admin/listing/update/:id",
            put(listing::update_listing),
        )
        .route(
            "/api/listing/listing/status/:id",
            put(listing::update_listing_status),
        )
        .route(
            "/api/favorites",
            post(listing::add_favorite).get(listing::favorites),
        )
        .route("/api/favorites/search", get(listing::search_favorites))
        .route("/api/favorites/:listing_id", delete(listing::remove_favorite))
        .route("/api/reviews", post(listing::create_review))
        .route(
            "/api/reviews/:id",
            get(listing::get_review).delete(listing::delete_review),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(public)
        .merge(authenticated)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Cookies ride along, so origins and headers must be explicit
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}
