//! User repository.
//!
//! Users are created by an external persistence layer; the auth service
//! reads them and lets a user edit their own name and email.
//! [`UserRepository`] is the seam: [`PgUserRepository`] in
//! production, [`InMemoryUserRepository`] for tests and local runs.
//! Soft-deleted users are invisible through both.

use crate::errors::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use uuid::Uuid;

/// User model (maps to users table).
#[derive(Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("email", &"[REDACTED]")
            .field("name", &self.name)
            .field("password_hash", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .field("created_at", &self.created_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

/// Fields a user may change on their own profile. `None` leaves the field
/// as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Active (not soft-deleted) user with this email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Active (not soft-deleted) user with this id.
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError>;

    /// Apply `update` to an active user and return the stored result.
    /// `Ok(None)` if no active user has this id.
    ///
    /// # Errors
    ///
    /// `AuthError::Conflict` if the new email belongs to another active user.
    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, AuthError>;

    /// Round-trip to the backing store.
    async fn health_check(&self) -> Result<(), AuthError>;
}

/// Postgres-backed repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                user_id, email, name, password_hash, is_admin,
                created_at, deleted_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Database(format!("Failed to fetch user by email: {}", e)))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                user_id, email, name, password_hash, is_admin,
                created_at, deleted_at
            FROM users
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Database(format!("Failed to fetch user by id: {}", e)))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE user_id = $1 AND deleted_at IS NULL
            RETURNING
                user_id, email, name, password_hash, is_admin,
                created_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(update.name.as_deref())
        .bind(update.email.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                AuthError::Conflict("Email is already in use".to_string())
            }
            _ => AuthError::Database(format!("Failed to update user profile: {}", e)),
        })
    }

    async fn health_check(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| AuthError::Database(format!("Database ping failed: {}", e)))
    }
}

/// Repository held entirely in memory, keyed by email.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.email.clone(), user);
        }
    }

    /// Mark a user deleted without removing the row.
    pub fn soft_delete(&self, email: &str) {
        if let Ok(mut users) = self.users.write() {
            if let Some(user) = users.get_mut(email) {
                user.deleted_at = Some(Utc::now());
            }
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let users = self
            .users
            .read()
            .map_err(|_| AuthError::Database("user store lock poisoned".to_string()))?;
        Ok(users
            .get(email)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let users = self
            .users
            .read()
            .map_err(|_| AuthError::Database("user store lock poisoned".to_string()))?;
        Ok(users
            .values()
            .find(|u| u.user_id == user_id && u.deleted_at.is_none())
            .cloned())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, AuthError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AuthError::Database("user store lock poisoned".to_string()))?;

        let Some(current_email) = users
            .values()
            .find(|u| u.user_id == user_id && u.deleted_at.is_none())
            .map(|u| u.email.clone())
        else {
            return Ok(None);
        };

        if let Some(new_email) = update.email.as_deref().filter(|e| *e != current_email) {
            if users.get(new_email).is_some_and(|u| u.deleted_at.is_none()) {
                return Err(AuthError::Conflict("Email is already in use".to_string()));
            }
        }

        let Some(mut user) = users.remove(&current_email) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        users.insert(user.email.clone(), user.clone());
        Ok(Some(user))
    }

    async fn health_check(&self) -> Result<(), AuthError> {
        self.users
            .read()
            .map(|_| ())
            .map_err(|_| AuthError::Database("user store lock poisoned".to_string()))
    }
}
