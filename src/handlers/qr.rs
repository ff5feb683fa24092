use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    error::Result,
    flash::{self, Flash},
    middleware_layer::auth::current_session,
    models::user::Role,
    state::AppState,
    views,
};

#[derive(Deserialize)]
pub struct QrDisplayQuery {
    pub qr_path: Option<String>,
}

/// Shows a previously issued QR code given its public address.
///
/// Only the signed-in student's own address is ever re-issued.
pub async fn qr_display(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<QrDisplayQuery>,
) -> Result<Response> {
    let session = current_session(&state, &cookies).await?.map(|(_, s)| s);
    let mut flashes = flash::take(&cookies);

    let mut artifact = match query.qr_path.as_deref() {
        Some(address) => state.qr.resolve(address).await,
        None => None,
    };

    if artifact.is_none() {
        if let (Some(session), Some(address)) = (session.as_ref(), query.qr_path.as_deref()) {
            if session.role == Role::Student && address == state.qr.url_for(&session.username) {
                artifact = Some(state.qr.ensure(&session.username, &session.username).await?);
            }
        }
    }

    let status = if artifact.is_some() {
        StatusCode::OK
    } else {
        flashes.push(Flash::danger("QR code not found."));
        StatusCode::NOT_FOUND
    };

    Ok((
        status,
        Html(views::qr_page(session.as_ref(), &flashes, artifact.as_ref())),
    )
        .into_response())
}
