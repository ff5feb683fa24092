use axum::{
    extract::State,
    response::Html,
    Extension,
};
use tower_cookies::Cookies;

use crate::{
    error::Result,
    flash,
    models::session::Session,
    state::AppState,
    views,
};

/// Lists the attendance records logged by the signed-in teacher.
///
/// Records are always filtered by the session's username, never by a
/// client-supplied value.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    cookies: Cookies,
) -> Result<Html<String>> {
    let records = state.attendance.list_for_teacher(&session.username).await?;
    tracing::debug!("📋 {} attendance records for {}", records.len(), session.username);

    let flashes = flash::take(&cookies);
    Ok(Html(views::teacher_page(&session, &flashes, &records)))
}
