use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::Result,
    flash::{self, Flash},
    models::{session::Session, user::Role},
    state::AppState,
};

/// The cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Extracts the session token from the request cookies.
///
/// # Returns
///
/// An `Option` containing the session ID if found.
pub fn extract_session_token(cookies: &Cookies) -> Option<Uuid> {
    cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Loads the live session named by the request's cookie, if any.
pub async fn current_session(state: &AppState, cookies: &Cookies) -> Result<Option<(Uuid, Session)>> {
    let Some(session_id) = extract_session_token(cookies) else {
        return Ok(None);
    };

    Ok(state
        .sessions
        .get(session_id)
        .await?
        .map(|session| (session_id, session)))
}

/// Lets the request through only for a session with `required` role.
///
/// Anonymous requests and sessions with another role are redirected to the
/// login page with a flash message.
async fn gate(
    state: &AppState,
    cookies: &Cookies,
    mut request: Request<Body>,
    next: Next,
    required: Role,
) -> Response {
    tracing::debug!("🔐 Checking {} access to {}", required, request.uri().path());

    match current_session(state, cookies).await {
        Ok(Some((_, session))) if session.role == required => {
            tracing::debug!("✅ User authenticated: {}", session.username);
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Ok(Some((_, session))) => {
            tracing::warn!(
                "❌ {} ({}) denied access to {}",
                session.username,
                session.role,
                request.uri().path()
            );
            flash::push(cookies, Flash::danger("You do not have access to that page."));
            Redirect::to("/login").into_response()
        }
        Ok(None) => {
            tracing::debug!("❌ No valid session for {}", request.uri().path());
            flash::push(cookies, Flash::danger("Please log in to continue."));
            Redirect::to("/login").into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// A middleware that admits only teacher sessions.
pub async fn require_teacher(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    gate(&state, &cookies, request, next, Role::Teacher).await
}
