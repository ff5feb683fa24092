use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    cookies::create_secure_cookie,
    crypto::csrf::generate_csrf_token,
    state::AppState,
};

/// The cookie carrying the CSRF token.
pub const CSRF_COOKIE: &str = "csrf_token";
/// Lifetime of an issued CSRF token.
const CSRF_MAX_AGE_SECS: i64 = 86400;

/// The CSRF token a rendered form must echo back.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

/// A middleware that makes sure every visitor holds a CSRF token.
///
/// The token is exposed to handlers as an `Extension<CsrfToken>`; forms
/// embed it in a hidden field and handlers compare the two on submit.
pub async fn ensure_csrf_token(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match cookies.get(CSRF_COOKIE) {
        Some(cookie) if !cookie.value().is_empty() => cookie.value().to_string(),
        _ => {
            let token = generate_csrf_token();
            tracing::debug!("🔐 Issued CSRF token: {}...", &token[..8]);
            cookies.add(create_secure_cookie(
                CSRF_COOKIE,
                token.clone(),
                CSRF_MAX_AGE_SECS,
                true,
                state.config.secure_cookies,
            ));
            token
        }
    };

    req.extensions_mut().insert(CsrfToken(token));
    next.run(req).await
}
