use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use tokio::sync::RwLock;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{
    error::Result,
    models::user::{NewUser, User},
};

/// Persists registered users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts the user unless the username is taken.
    ///
    /// Returns `None` when a user with the same username already exists. The
    /// check and the insert happen atomically.
    async fn insert_if_absent(&self, user: NewUser) -> Result<Option<User>>;

    /// Finds a user by their username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: row.try_get("role")?,
        created_at: row.try_get("created_at")?,
    })
}

/// A `UserStore` backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_if_absent(&self, user: NewUser) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO users (id, username, password_hash, role)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (username) DO NOTHING
                RETURNING id, username, password_hash, role, created_at
                "#,
            )
            .await?;
        let row = client
            .query_opt(
                &statement,
                &[&Uuid::new_v4(), &user.username, &user.password_hash, &user.role],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                SELECT id, username, password_hash, role, created_at
                FROM users
                WHERE username = $1
                "#,
            )
            .await?;
        let row = client.query_opt(&statement, &[&username]).await?;
        row.map(|r| row_to_user(&r)).transpose()
    }
}

/// A process-local `UserStore`, used when no database is configured.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_if_absent(&self, user: NewUser) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Ok(None);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        users.insert(user.username.clone(), user.clone());
        Ok(Some(user))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(username).cloned())
    }
}
