//! Account/role directory.
//!
//! Persisted user identities. Role is fixed at creation; nothing here
//! updates or deletes a user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::types::user::normalize_email;
use crate::{CoreError, Result, Role, User};

/// Fields needed to create a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
}

/// Lookup and creation of user identities.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create a user; a duplicate email fails with `Conflict`.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn get_by_email(&self, email: &str) -> Result<User>;

    async fn get_by_id(&self, id: Uuid) -> Result<User>;
}

fn user_not_found() -> CoreError {
    CoreError::NotFound("user not found".to_string())
}

fn email_taken() -> CoreError {
    CoreError::Conflict("email already registered".to_string())
}

/// PostgreSQL-backed directory.
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    full_name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role: row.role.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, created_at, updated_at";

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn create(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, full_name, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(normalize_email(&user.email))
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    email_taken()
                } else {
                    CoreError::Database(e)
                }
            })?;

        row.try_into()
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(user_not_found)?.try_into()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(user_not_found)?.try_into()
    }
}

/// In-memory directory for tests and local runs without a database.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create(&self, user: NewUser) -> Result<User> {
        let email = normalize_email(&user.email);
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(email_taken());
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let email = normalize_email(email);
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(user_not_found)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(user_not_found)
    }
}
