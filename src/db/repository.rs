//! User repository for docpool.

use sqlx::{QueryBuilder, SqlitePool};

use super::user::{NewUser, User, UserUpdate};
use crate::{DocpoolError, Result};

const USER_COLUMNS: &str = "id, email, display_name, role, created_at, last_login";

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        sqlx::query("INSERT INTO users (id, email, display_name, role) VALUES (?, ?, ?, ?)")
            .bind(&new_user.id)
            .bind(&new_user.email)
            .bind(&new_user.display_name)
            .bind(new_user.role.as_str())
            .execute(self.pool)
            .await?;

        self.get_by_id(&new_user.id)
            .await?
            .ok_or_else(|| DocpoolError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Insert the user or refresh the identity fields of an existing record.
    ///
    /// The role is always overwritten and `last_login` is always touched.
    pub async fn upsert_on_login(&self, new_user: &NewUser) -> Result<User> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, role, last_login)
             VALUES (?, ?, ?, ?, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                display_name = excluded.display_name,
                role = excluded.role,
                last_login = excluded.last_login",
        )
        .bind(&new_user.id)
        .bind(&new_user.email)
        .bind(&new_user.display_name)
        .bind(new_user.role.as_str())
        .execute(self.pool)
        .await?;

        self.get_by_id(&new_user.id)
            .await?
            .ok_or_else(|| DocpoolError::NotFound("user".to_string()))
    }

    /// Update a user by ID.
    ///
    /// Only fields that are set in the update will be modified.
    /// Returns the updated user, or None if not found.
    pub async fn update(&self, id: &str, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref email) = update.email {
            separated.push("email = ");
            separated.push_bind_unseparated(email.clone());
        }
        if let Some(ref display_name) = update.display_name {
            separated.push("display_name = ");
            separated.push_bind_unseparated(display_name.clone());
        }
        if let Some(role) = update.role {
            separated.push("role = ");
            separated.push_bind_unseparated(role.as_str().to_string());
        }

        query.push(" WHERE id = ");
        query.push_bind(id.to_string());

        let result = query.build().execute(self.pool).await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }
}
