use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::repositories::{
    attendance::{AttendanceStore, MemoryAttendanceStore, PgAttendanceStore},
    session::{MemorySessionStore, RedisSessionStore, SessionStore},
    user::{MemoryUserStore, PgUserStore, UserStore},
};
use crate::services::qr::QrService;

/// The application's state, handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Registered users.
    pub users: Arc<dyn UserStore>,
    /// Logged attendance.
    pub attendance: Arc<dyn AttendanceStore>,
    /// Authenticated browser sessions.
    pub sessions: Arc<dyn SessionStore>,
    /// QR code issuance.
    pub qr: QrService,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState`, connecting to Postgres and Redis when configured.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let (users, attendance): (Arc<dyn UserStore>, Arc<dyn AttendanceStore>) =
            match config.database_url.as_deref() {
                Some(database_url) => {
                    let db = crate::db::create_pool(database_url)?;
                    crate::db::init_schema(&db).await?;
                    tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");
                    (
                        Arc::new(PgUserStore::new(db.clone())),
                        Arc::new(PgAttendanceStore::new(db)),
                    )
                }
                None => {
                    tracing::warn!("⚠️ DATABASE_URL not set, using in-memory stores");
                    (
                        Arc::new(MemoryUserStore::new()),
                        Arc::new(MemoryAttendanceStore::new()),
                    )
                }
            };

        let sessions: Arc<dyn SessionStore> = match config.redis_url.as_deref() {
            Some(redis_url) => {
                let store = RedisSessionStore::connect(redis_url).await?;
                tracing::info!("✅ Redis Connection Manager initialized");
                Arc::new(store)
            }
            None => {
                tracing::warn!("⚠️ REDIS_URL not set, sessions are kept in memory");
                Arc::new(MemorySessionStore::new())
            }
        };

        Ok(Self::with_stores(config.clone(), users, attendance, sessions))
    }

    /// Builds a state from explicit stores.
    pub fn with_stores(
        config: Config,
        users: Arc<dyn UserStore>,
        attendance: Arc<dyn AttendanceStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let qr = QrService::new(config.qr_dir.clone());
        Self {
            users,
            attendance,
            sessions,
            qr,
            config,
        }
    }

    /// A state backed entirely by in-memory stores.
    pub fn in_memory(config: Config) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryAttendanceStore::new()),
            Arc::new(MemorySessionStore::new()),
        )
    }
}
