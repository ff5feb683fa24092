use axum::{
    extract::{Multipart, State},
    response::{Html, IntoResponse, Response},
    Extension,
};
use tower_cookies::Cookies;

use crate::{
    crypto::csrf::verify_csrf_token,
    error::Result,
    flash::{self, Flash},
    middleware_layer::csrf::CsrfToken,
    models::session::Session,
    services::attendance as attendance_service,
    state::AppState,
    validation::{
        form::{FieldErrors, validated},
        scan::ScanForm,
    },
    views,
};

/// Renders the QR scan form.
pub async fn scan_form(
    Extension(session): Extension<Session>,
    Extension(csrf): Extension<CsrfToken>,
    cookies: Cookies,
) -> Html<String> {
    let flashes = flash::take(&cookies);
    Html(views::scan_page(&csrf.0, &session, &flashes, &FieldErrors::default()))
}

/// Accepts an uploaded QR code image and records attendance for it.
pub async fn scan(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(csrf): Extension<CsrfToken>,
    cookies: Cookies,
    multipart: Multipart,
) -> Result<Response> {
    tracing::info!("📷 Scan upload by: {}", session.username);
    let mut flashes = flash::take(&cookies);

    let outcome = async {
        let form = ScanForm::from_multipart(multipart).await?;
        verify_csrf_token(Some(&csrf.0), &form.csrf_token)?;
        let form = validated(form)?;
        attendance_service::record_scan(state.attendance.as_ref(), &session, &form).await
    }
    .await;

    match outcome {
        Ok((_, payload)) => {
            flashes.push(Flash::success(format!(
                "Attendance marked successfully for {}!",
                payload.name
            )));
            Ok(Html(views::scan_page(&csrf.0, &session, &flashes, &FieldErrors::default()))
                .into_response())
        }
        Err(e) => e.render_form(&mut flashes, |flashes, errors| {
            views::scan_page(&csrf.0, &session, flashes, errors)
        }),
    }
}
