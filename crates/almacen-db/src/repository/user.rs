//! # User Repository
//!
//! Login accounts for the terminal. Passwords are stored as SHA-256 hex
//! digests and compared digest-to-digest; the plaintext never touches the
//! database.

use almacen_core::{Role, User};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{StoreError, StoreResult};

/// SHA-256 hex digest of a password.
fn digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Repository for store users.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates a user account. Usernames are unique.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
        )
        .bind(username)
        .bind(digest(password))
        .bind(role)
        .execute(&self.pool)
        .await?;

        info!(username, "User created");
        Ok(result.last_insert_rowid())
    }

    /// Verifies a login attempt. Returns the user on a digest match, `None`
    /// for a wrong password or unknown username (indistinguishable on
    /// purpose).
    pub async fn verify(&self, username: &str, password: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, role FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.filter(|u| u.password_hash == digest(password)))
    }

    /// Replaces a user's password.
    pub async fn change_password(&self, username: &str, new_password: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?1 WHERE username = ?2")
            .bind(digest(new_password))
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Internal(format!(
                "No such user: {username}"
            )));
        }

        Ok(())
    }

    /// All users, for the administration screen.
    pub async fn list(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, role FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
