use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{AuthSubject, Credential, NewUser, User};

const UNIQUE_VIOLATION: &str = "23505";
const NOT_NULL_VIOLATION: &str = "23502";
const STRING_TOO_LONG: &str = "22001";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("value exceeds column length")]
    FieldTooLong,
    #[error("required column is null")]
    MissingField,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Constraint failure for a Postgres SQLSTATE the caller can act on.
    fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            UNIQUE_VIOLATION => Some(StoreError::DuplicateEmail),
            NOT_NULL_VIOLATION => Some(StoreError::MissingField),
            STRING_TOO_LONG => Some(StoreError::FieldTooLong),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(mapped) = db_err.code().as_deref().and_then(StoreError::from_sqlstate) {
                return mapped;
            }
        }
        StoreError::Database(err)
    }
}

/// Persistence for users and their credentials.
///
/// Every call goes to the backing store; nothing is cached, so a password
/// change is visible to the next authorization check.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts the user and its credential atomically.
    async fn create_user(&self, user: &NewUser, password_hash: &str) -> Result<User, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_credential(&self, user_id: Uuid) -> Result<Option<Credential>, StoreError>;
    async fn find_auth_subject(&self, user_id: Uuid) -> Result<Option<AuthSubject>, StoreError>;
    /// Replaces any pending reset for the user.
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: &str,
        expires_on: OffsetDateTime,
    ) -> Result<(), StoreError>;
    async fn find_credential_by_reset_token(
        &self,
        digest: &str,
    ) -> Result<Option<Credential>, StoreError>;
    async fn clear_reset_token(&self, user_id: Uuid) -> Result<(), StoreError>;
    /// Stores a new hash and clears the reset fields, but only while `digest`
    /// is still the pending reset. Returns false when another request got
    /// there first.
    async fn reset_password(
        &self,
        user_id: Uuid,
        digest: &str,
        password_hash: &str,
        changed_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;
    async fn change_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        changed_at: OffsetDateTime,
    ) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, user: &NewUser, password_hash: &str) -> Result<User, StoreError> {
        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, middle_name, gender, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, first_name, last_name, middle_name, gender, email, phone_number,
                      profile_picture, dob, created_at
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.middle_name)
        .bind(&user.gender)
        .bind(&user.email)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, password)
            VALUES ($1, $2)
            "#,
        )
        .bind(created.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, middle_name, gender, email, phone_number,
                   profile_picture, dob, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, middle_name, gender, email, phone_number,
                   profile_picture, dob, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_credential(&self, user_id: Uuid) -> Result<Option<Credential>, StoreError> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT user_id, password, password_changed_at, password_reset_token,
                   password_expires_on
            FROM credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(credential)
    }

    async fn find_auth_subject(&self, user_id: Uuid) -> Result<Option<AuthSubject>, StoreError> {
        let subject = sqlx::query_as::<_, AuthSubject>(
            r#"
            SELECT u.id, u.email, c.password_changed_at
            FROM users u
            JOIN credentials c ON c.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(subject)
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: &str,
        expires_on: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE credentials
            SET password_reset_token = $2, password_expires_on = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(digest)
        .bind(expires_on)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_credential_by_reset_token(
        &self,
        digest: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT user_id, password, password_changed_at, password_reset_token,
                   password_expires_on
            FROM credentials
            WHERE password_reset_token = $1
            "#,
        )
        .bind(digest)
        .fetch_optional(&self.db)
        .await?;
        Ok(credential)
    }

    async fn clear_reset_token(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE credentials
            SET password_reset_token = NULL, password_expires_on = NULL, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        digest: &str,
        password_hash: &str,
        changed_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET password = $3,
                password_changed_at = $4,
                password_reset_token = NULL,
                password_expires_on = NULL,
                updated_at = NOW()
            WHERE user_id = $1 AND password_reset_token = $2
            "#,
        )
        .bind(user_id)
        .bind(digest)
        .bind(password_hash)
        .bind(changed_at)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn change_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        changed_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE credentials
            SET password = $2, password_changed_at = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(changed_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
