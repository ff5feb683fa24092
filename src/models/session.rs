use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::Role;

/// Represents an authenticated browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The username this session belongs to.
    pub username: String,
    /// The role the user registered with.
    pub role: Role,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for `username` lasting `duration_days`.
    pub fn new(username: String, role: Role, duration_days: i64) -> Self {
        let created_at = Utc::now();
        Self {
            username,
            role,
            created_at,
            expires_at: created_at + chrono::Duration::days(duration_days),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
