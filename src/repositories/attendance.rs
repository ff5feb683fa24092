use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio::sync::RwLock;
use tokio_postgres::Row;

use crate::{
    error::Result,
    models::attendance::{AttendanceRecord, NewAttendance, RecordId},
};

/// Append-only storage for attendance records.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Appends one record stamped with the server time.
    ///
    /// Inserts are unconditional: repeated scans produce repeated records.
    async fn record(&self, scan: NewAttendance) -> Result<RecordId>;

    /// Lists the records logged by `teacher_id`, oldest first.
    async fn list_for_teacher(&self, teacher_id: &str) -> Result<Vec<AttendanceRecord>>;
}

fn row_to_record(row: &Row) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        student_name: row.try_get("student_name")?,
        teacher_id: row.try_get("teacher_id")?,
        period: row.try_get("period")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

/// An `AttendanceStore` backed by the `attendance` table.
#[derive(Clone)]
pub struct PgAttendanceStore {
    pool: Pool,
}

impl PgAttendanceStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn record(&self, scan: NewAttendance) -> Result<RecordId> {
        let record = scan.into_record();
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO attendance (id, student_id, student_name, teacher_id, period, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .await?;
        client
            .execute(
                &statement,
                &[
                    &record.id,
                    &record.student_id,
                    &record.student_name,
                    &record.teacher_id,
                    &record.period,
                    &record.recorded_at,
                ],
            )
            .await?;
        Ok(record.id)
    }

    async fn list_for_teacher(&self, teacher_id: &str) -> Result<Vec<AttendanceRecord>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                SELECT id, student_id, student_name, teacher_id, period, recorded_at
                FROM attendance
                WHERE teacher_id = $1
                ORDER BY seq ASC
                "#,
            )
            .await?;
        let rows = client.query(&statement, &[&teacher_id]).await?;
        rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()
    }
}

/// A process-local `AttendanceStore`, used when no database is configured.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    records: RwLock<Vec<AttendanceRecord>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn record(&self, scan: NewAttendance) -> Result<RecordId> {
        let record = scan.into_record();
        let id = record.id;
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn list_for_teacher(&self, teacher_id: &str) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.teacher_id == teacher_id)
            .cloned()
            .collect())
    }
}
