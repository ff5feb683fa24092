use crate::error::{AppError, Result};
use crate::models::attendance::{NewAttendance, RecordId};
use crate::models::session::Session;
use crate::models::user::Role;
use crate::repositories::attendance::AttendanceStore;
use crate::services::qr::{self, QrPayload};
use crate::validation::scan::ScanForm;

/// Decodes the uploaded QR code and logs attendance for it.
///
/// The recorded teacher is always the session's user. A `teacher_id` form
/// value naming someone else is rejected rather than trusted.
///
/// # Returns
///
/// A `Result` containing the new record id and the student read from the code.
pub async fn record_scan(
    store: &dyn AttendanceStore,
    session: &Session,
    form: &ScanForm,
) -> Result<(RecordId, QrPayload)> {
    if session.role != Role::Teacher {
        return Err(AppError::Forbidden(
            "Only teachers can record attendance.".to_string(),
        ));
    }

    if let Some(claimed) = form.teacher_id.as_deref() {
        if claimed != session.username {
            tracing::warn!(
                "❌ Scan by {} claimed teacher_id {}; rejecting",
                session.username,
                claimed
            );
            return Err(AppError::Forbidden(
                "Teacher ID does not match the signed-in teacher.".to_string(),
            ));
        }
    }

    let bytes = form.qr_code.clone();
    let payload = tokio::task::spawn_blocking(move || qr::ingest(&bytes))
        .await
        .map_err(|e| AppError::Internal(format!("QR decode task failed: {}", e)))??;

    let record_id = store
        .record(NewAttendance {
            student_id: payload.student_id.clone(),
            student_name: payload.name.clone(),
            teacher_id: session.username.clone(),
            period: form.period.clone(),
        })
        .await?;

    tracing::info!(
        "✅ Attendance recorded: student={} teacher={} period={}",
        payload.student_id,
        session.username,
        form.period
    );

    Ok((record_id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::attendance::MemoryAttendanceStore;
    use crate::services::qr::{IngestionError, render_png};

    fn teacher(name: &str) -> Session {
        Session::new(name.to_string(), Role::Teacher, 1)
    }

    fn scan(png: Vec<u8>, teacher_id: Option<&str>) -> ScanForm {
        ScanForm {
            qr_code: png,
            period: "P1".to_string(),
            teacher_id: teacher_id.map(str::to_string),
            csrf_token: String::new(),
        }
    }

    #[tokio::test]
    async fn test_teacher_comes_from_session() {
        let store = MemoryAttendanceStore::new();
        let png = render_png(r#"{"student_id":"alice","name":"Alice"}"#).unwrap();

        let (id, payload) = record_scan(&store, &teacher("bob"), &scan(png, None)).await.unwrap();
        assert_eq!(payload.student_id, "alice");

        let records = store.list_for_teacher("bob").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].student_name, "Alice");
        assert_eq!(records[0].period, "P1");
    }

    #[tokio::test]
    async fn test_mismatched_teacher_id_is_rejected() {
        let store = MemoryAttendanceStore::new();
        let png = render_png(r#"{"student_id":"alice","name":"Alice"}"#).unwrap();

        let err = record_scan(&store, &teacher("bob"), &scan(png, Some("mallory")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(store.list_for_teacher("mallory").await.unwrap().is_empty());
        assert!(store.list_for_teacher("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_students_cannot_record() {
        let store = MemoryAttendanceStore::new();
        let png = render_png(r#"{"student_id":"alice","name":"Alice"}"#).unwrap();
        let student = Session::new("alice".to_string(), Role::Student, 1);

        let err = record_scan(&store, &student, &scan(png, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_ingestion_failure_records_nothing() {
        let store = MemoryAttendanceStore::new();
        let png = render_png("not json").unwrap();

        let err = record_scan(&store, &teacher("bob"), &scan(png, Some("bob")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Ingestion(IngestionError::InvalidJson(_))));
        assert!(store.list_for_teacher("bob").await.unwrap().is_empty());
    }
}
