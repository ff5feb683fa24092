use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identifier assigned to a stored attendance record.
pub type RecordId = Uuid;

/// One logged scan of a student's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// The unique identifier for the record.
    pub id: RecordId,
    /// The student id read from the QR code.
    pub student_id: String,
    /// The student name read from the QR code.
    pub student_name: String,
    /// The username of the teacher who scanned the code.
    pub teacher_id: String,
    /// The class period the scan was logged for.
    pub period: String,
    /// The server time the scan was recorded at.
    pub recorded_at: DateTime<Utc>,
}

/// A scan waiting to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendance {
    pub student_id: String,
    pub student_name: String,
    pub teacher_id: String,
    pub period: String,
}

impl NewAttendance {
    /// Stamps the scan with the current server time.
    pub fn into_record(self) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: self.student_id,
            student_name: self.student_name,
            teacher_id: self.teacher_id,
            period: self.period,
            recorded_at: Utc::now(),
        }
    }
}
