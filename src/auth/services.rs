use std::sync::Arc;

use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::AuthUser,
        jwt::{IssuedToken, JwtKeys},
        notify::{self, NotificationKind, Notifier},
        password::Hasher,
        repo::CredentialStore,
        repo_types::{NewUser, User},
        reset,
    },
    config::ResetConfig,
    error::AppError,
};

/// Registration input after boundary validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: NewUser,
    pub password: String,
    pub password_again: String,
}

#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub new_password_again: String,
}

/// Token handed back after register, login or reset.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: IssuedToken,
    pub user: Option<User>,
}

/// Registration, login, password lifecycle and the authorization check.
///
/// Every step returns early on its first failure.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: Hasher,
    keys: JwtKeys,
    notifier: Arc<dyn Notifier>,
    reset: ResetConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Hasher,
        keys: JwtKeys,
        notifier: Arc<dyn Notifier>,
        reset: ResetConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            keys,
            notifier,
            reset,
        }
    }

    #[instrument(skip_all, fields(email = %input.user.email))]
    pub async fn register(&self, input: Registration) -> Result<Session, AppError> {
        if input.password != input.password_again {
            return Err(AppError::PasswordMismatch);
        }

        let hash = self.hasher.hash(&input.password).await?;
        let user = self.store.create_user(&input.user, &hash).await?;
        let token = self.keys.issue(user.id)?;

        notify::dispatch(
            self.notifier.clone(),
            NotificationKind::Welcome,
            user.email.clone(),
            json!({ "first_name": user.first_name, "last_name": user.last_name }),
        );

        info!(user_id = %user.id, "user registered");
        Ok(Session {
            token,
            user: Some(user),
        })
    }

    #[instrument(skip_all, fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            self.hasher.verify_dummy(password).await?;
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let Some(credential) = self.store.find_credential(user.id).await? else {
            self.hasher.verify_dummy(password).await?;
            warn!(user_id = %user.id, "login user without credential");
            return Err(AppError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &credential.password).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session {
            token,
            user: Some(user),
        })
    }

    /// Resolves a bearer token to the current account.
    ///
    /// Re-reads `password_changed_at` on every call, so tokens issued before
    /// the latest password change stop working immediately.
    pub async fn authorize(&self, token: &str) -> Result<AuthUser, AppError> {
        let claims = self.keys.verify(token)?;

        let Some(subject) = self.store.find_auth_subject(claims.user_id).await? else {
            return Err(AppError::UserGone);
        };

        if subject.password_changed_at.unix_timestamp() > claims.iat {
            return Err(AppError::PasswordChangedSince);
        }

        Ok(AuthUser {
            id: subject.id,
            email: subject.email,
        })
    }

    #[instrument(skip_all, fields(email = %email))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            return Err(AppError::UserNotFound);
        };

        let secret = reset::generate_secret();
        let expires_on = OffsetDateTime::now_utc() + Duration::minutes(self.reset.ttl_minutes);
        self.store
            .set_reset_token(user.id, &reset::digest(&secret), expires_on)
            .await?;

        let url = format!("{}/{}", self.reset.url.trim_end_matches('/'), secret);
        notify::dispatch(
            self.notifier.clone(),
            NotificationKind::PasswordReset,
            user.email.clone(),
            json!({ "first_name": user.first_name, "url": url }),
        );

        info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        raw_token: &str,
        new_password: &str,
        new_password_again: &str,
    ) -> Result<Session, AppError> {
        if new_password != new_password_again {
            return Err(AppError::PasswordMismatch);
        }

        let digest = reset::digest(raw_token);
        let Some(credential) = self.store.find_credential_by_reset_token(&digest).await? else {
            return Err(AppError::InvalidToken);
        };

        let now = OffsetDateTime::now_utc();
        let live = credential.password_expires_on.is_some_and(|exp| exp >= now);
        if !live {
            // an expired secret can never be retried
            self.store.clear_reset_token(credential.user_id).await?;
            warn!(user_id = %credential.user_id, "expired reset token used");
            return Err(AppError::ResetTokenExpired);
        }

        let hash = self.hasher.hash(new_password).await?;
        let consumed = self
            .store
            .reset_password(credential.user_id, &digest, &hash, now)
            .await?;
        if !consumed {
            // a concurrent request used the same secret first
            warn!(user_id = %credential.user_id, "reset token already consumed");
            return Err(AppError::InvalidToken);
        }
        let token = self.keys.issue(credential.user_id)?;

        info!(user_id = %credential.user_id, "password reset");
        Ok(Session { token, user: None })
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        change: PasswordChange,
    ) -> Result<(), AppError> {
        if change.new_password != change.new_password_again {
            return Err(AppError::PasswordMismatch);
        }
        if change.new_password == change.old_password {
            return Err(AppError::PasswordUnchanged);
        }

        let Some(credential) = self.store.find_credential(user_id).await? else {
            return Err(AppError::InvalidCredentials);
        };
        if !self
            .hasher
            .verify(&change.old_password, &credential.password)
            .await?
        {
            warn!("change password with wrong old password");
            return Err(AppError::InvalidCredentials);
        }

        let hash = self.hasher.hash(&change.new_password).await?;
        // backdated so a token issued later in the same second stays valid
        let changed_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        self.store
            .change_password(user_id, &hash, changed_at)
            .await?;

        info!("password changed");
        Ok(())
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AppError::UserGone)
    }
}
