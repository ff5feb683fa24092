use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use tower_cookies::Cookies;

use crate::{
    cookies::{create_secure_cookie, removal_cookie},
    crypto::csrf::verify_csrf_token,
    error::Result,
    flash::{self, Flash},
    middleware_layer::{
        auth::{SESSION_COOKIE, current_session, extract_session_token},
        csrf::CsrfToken,
    },
    models::{session::Session, user::Role},
    services::auth as auth_service,
    state::AppState,
    validation::{
        auth::{LoginForm, RegistrationForm},
        form::{FieldErrors, validated},
    },
    views,
};

/// Where a freshly signed-in user lands.
fn landing_page(state: &AppState, session: &Session) -> String {
    match session.role {
        Role::Teacher => "/teacher".to_string(),
        Role::Student => format!("/qr_display?qr_path={}", state.qr.url_for(&session.username)),
    }
}

/// Redirects the root path to the login page.
pub async fn home() -> Redirect {
    Redirect::to("/login")
}

/// Renders the registration form.
pub async fn register_form(
    Extension(csrf): Extension<CsrfToken>,
    cookies: Cookies,
) -> Html<String> {
    let flashes = flash::take(&cookies);
    Html(views::register_page(&csrf.0, &flashes, &FieldErrors::default(), "", None))
}

/// Handles user registration.
///
/// Students are shown their freshly issued QR code; teachers are sent to the
/// login page.
pub async fn register(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    cookies: Cookies,
    Form(form): Form<RegistrationForm>,
) -> Result<Response> {
    tracing::info!("📝 Register attempt for: {}", form.username);
    let mut flashes = flash::take(&cookies);
    let username = form.username.clone();
    let role = form.role.parse::<Role>().ok();
    let render = |flashes: &[Flash], errors: &FieldErrors| {
        views::register_page(&csrf.0, flashes, errors, &username, role)
    };

    let outcome = async {
        verify_csrf_token(Some(&csrf.0), &form.csrf_token)?;
        let form = validated(form)?;
        tracing::info!("✅ Validations passed for: {}", form.username);
        auth_service::register(state.users.as_ref(), &state.qr, &form).await
    }
    .await;

    let registered = match outcome {
        Ok(registered) => registered,
        Err(e) => return e.render_form(&mut flashes, render),
    };

    match registered.qr {
        Some(artifact) => {
            flashes.push(Flash::success(
                "Registration successful! Your QR code has been generated.",
            ));
            Ok((
                StatusCode::CREATED,
                Html(views::qr_page(None, &flashes, Some(&artifact))),
            )
                .into_response())
        }
        None => {
            flash::push(&cookies, Flash::success("Registration successful!"));
            Ok(Redirect::to("/login").into_response())
        }
    }
}

/// Renders the login form.
pub async fn login_form(
    Extension(csrf): Extension<CsrfToken>,
    cookies: Cookies,
) -> Html<String> {
    let flashes = flash::take(&cookies);
    Html(views::login_page(&csrf.0, &flashes, &FieldErrors::default(), ""))
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", form.username);
    let mut flashes = flash::take(&cookies);
    let username = form.username.clone();
    let render = |flashes: &[Flash], errors: &FieldErrors| {
        views::login_page(&csrf.0, flashes, errors, &username)
    };

    let outcome = async {
        verify_csrf_token(Some(&csrf.0), &form.csrf_token)?;
        let form = validated(form)?;
        auth_service::authenticate(state.users.as_ref(), &form.username, &form.password).await
    }
    .await;

    let user = match outcome {
        Ok(user) => user,
        Err(e) => return e.render_form(&mut flashes, render),
    };

    if let Some(previous) = extract_session_token(&cookies) {
        state.sessions.delete(previous).await?;
    }

    let session = Session::new(user.username, user.role, state.config.session_duration_days);
    let session_id = state.sessions.create(&session).await?;

    cookies.add(create_secure_cookie(
        SESSION_COOKIE,
        session_id.to_string(),
        state.config.session_duration_days * 86400,
        true,
        state.config.secure_cookies,
    ));

    tracing::info!("✅ User logged in: {} ({})", session.username, session.role);

    Ok(Redirect::to(&landing_page(&state, &session)).into_response())
}

/// Handles user logout.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect> {
    if let Some((session_id, session)) = current_session(&state, &cookies).await? {
        state.sessions.delete(session_id).await?;
        tracing::info!("✅ User logged out: {}", session.username);
    }

    cookies.remove(removal_cookie(SESSION_COOKIE));
    flash::push(&cookies, Flash::success("You have been logged out."));

    Ok(Redirect::to("/login"))
}
