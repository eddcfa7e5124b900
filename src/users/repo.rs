use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{DeleteOutcome, NewUser, User, UserChanges};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistent collection of users.
///
/// Email uniqueness and admin-delete protection are enforced by the store itself,
/// each in a single atomic operation, so callers never check-then-write.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    /// Inserts the user unless the email is taken; `None` means it was.
    async fn insert_if_absent(&self, new: NewUser) -> Result<Option<User>, StoreError>;
    /// Applies `changes` and returns the updated row, or `None` if the id is unknown.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;
    async fn delete_unless_admin(&self, id: Uuid) -> Result<DeleteOutcome, StoreError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, is_admin, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_sqlx(err: sqlx::Error, what: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Backend(anyhow::Error::new(err).context(what)),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn insert_if_absent(&self, new: NewUser) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, is_admin)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.is_admin)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_sqlx(e, "insert user"))
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name          = COALESCE($2, name),
                   email         = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash),
                   is_admin      = COALESCE($5, is_admin),
                   updated_at    = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.is_admin)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_sqlx(e, "update user"))
    }

    async fn delete_unless_admin(&self, id: Uuid) -> Result<DeleteOutcome, StoreError> {
        // Lookup and delete share one statement so a concurrent promotion
        // cannot land between them.
        let row: Option<(bool, bool)> = sqlx::query_as(
            r#"
            WITH target AS (
                SELECT id, is_admin FROM users WHERE id = $1 FOR UPDATE
            ),
            removed AS (
                DELETE FROM users u
                 USING target t
                 WHERE u.id = t.id AND NOT t.is_admin
                RETURNING u.id
            )
            SELECT t.is_admin, EXISTS (SELECT 1 FROM removed)
              FROM target t
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete user")?;

        Ok(match row {
            None => DeleteOutcome::NotFound,
            Some((_, true)) => DeleteOutcome::Deleted,
            Some((_, false)) => DeleteOutcome::Protected,
        })
    }
}
