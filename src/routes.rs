use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::get,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, services::qr::QR_URL_PREFIX, state::AppState};

/// Builds the application's router.
pub fn build_router(state: AppState) -> Router {
    let teacher_routes = Router::new()
        .route(
            "/student",
            get(handlers::student::scan_form).post(handlers::student::scan),
        )
        .route("/teacher", get(handlers::teacher::dashboard))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_teacher,
        ));

    Router::new()
        .route("/", get(handlers::auth::home))
        .route(
            "/register",
            get(handlers::auth::register_form).post(handlers::auth::register),
        )
        .route(
            "/login",
            get(handlers::auth::login_form).post(handlers::auth::login),
        )
        .route("/logout", get(handlers::auth::logout))
        .route("/qr_display", get(handlers::qr::qr_display))
        .route("/health", get(|| async { "ok" }))
        .merge(teacher_routes)
        .nest_service(QR_URL_PREFIX, ServeDir::new(&state.config.qr_dir))
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::csrf::ensure_csrf_token,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state)
}
