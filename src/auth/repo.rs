use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

/// Which unique column a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl UniqueField {
    pub fn message(self) -> &'static str {
        match self {
            UniqueField::Email => "Email already registered",
            UniqueField::Username => "Username already taken",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {0:?}")]
    Duplicate(UniqueField),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistent user records keyed by unique username and unique email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Uniqueness is enforced here, not by the caller.
    async fn insert(&self, new: NewUser<'_>) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Store a reset token hash and expiry, replacing any previous pair.
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;
    /// User holding an unexpired reset token with this hash.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;
    /// Swap in a new password hash and clear the reset pair in one write,
    /// only if the token is still live. Returns the user id on success.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError>;
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, reset_token_hash, reset_token_expires_at, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Which unique column a violated constraint guards, by constraint name.
fn unique_field_for(constraint: Option<&str>) -> Option<UniqueField> {
    match constraint? {
        "users_email_key" => Some(UniqueField::Email),
        "users_username_key" => Some(UniqueField::Username),
        _ => None,
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            if let Some(field) = unique_field_for(db_err.constraint()) {
                return StoreError::Duplicate(field);
            }
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, new: NewUser<'_>) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(new.username)
            .bind(new.email)
            .bind(new.password_hash)
            .fetch_one(&self.db)
            .await
            .map_err(map_insert_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token_hash = $2,
                   reset_token_expires_at = $3
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > $2"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
               SET password_hash = $3,
                   reset_token_hash = NULL,
                   reset_token_expires_at = NULL
             WHERE reset_token_hash = $1
               AND reset_token_expires_at > $2
            RETURNING id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .bind(new_password_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }
}
