//! In-memory `CredentialStore` for tests. Mirrors the column limits and
//! the unique email constraint of the SQL schema.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    repo::{CredentialStore, StoreError},
    repo_types::{AuthSubject, Credential, NewUser, User},
};

const NAME_LIMIT: usize = 50;
const EMAIL_LIMIT: usize = 256;

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    credentials: Vec<Credential>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls seen so far.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    pub fn credential_count(&self) -> usize {
        self.inner.lock().unwrap().credentials.len()
    }

    pub fn credential_for(&self, user_id: Uuid) -> Option<Credential> {
        let tables = self.inner.lock().unwrap();
        tables.credentials.iter().find(|c| c.user_id == user_id).cloned()
    }

    pub fn set_reset_expiry(&self, user_id: Uuid, expires_on: OffsetDateTime) {
        let mut tables = self.inner.lock().unwrap();
        if let Some(c) = tables.credentials.iter_mut().find(|c| c.user_id == user_id) {
            c.password_expires_on = Some(expires_on);
        }
    }

    pub fn set_password_changed_at(&self, user_id: Uuid, changed_at: OffsetDateTime) {
        let mut tables = self.inner.lock().unwrap();
        if let Some(c) = tables.credentials.iter_mut().find(|c| c.user_id == user_id) {
            c.password_changed_at = changed_at;
        }
    }

    pub fn delete_user(&self, user_id: Uuid) {
        let mut tables = self.inner.lock().unwrap();
        tables.users.retain(|u| u.id != user_id);
        tables.credentials.retain(|c| c.user_id != user_id);
    }

    fn update<F>(&self, user_id: Uuid, f: F)
    where
        F: FnOnce(&mut Credential),
    {
        let mut tables = self.inner.lock().unwrap();
        tables.writes += 1;
        if let Some(c) = tables.credentials.iter_mut().find(|c| c.user_id == user_id) {
            f(c);
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_user(&self, user: &NewUser, password_hash: &str) -> Result<User, StoreError> {
        // VARCHAR(n) counts characters, not bytes
        let too_long = |s: &str, limit: usize| s.chars().count() > limit;
        if too_long(&user.first_name, NAME_LIMIT)
            || too_long(&user.last_name, NAME_LIMIT)
            || user.middle_name.as_deref().is_some_and(|m| too_long(m, NAME_LIMIT))
            || too_long(&user.email, EMAIL_LIMIT)
        {
            return Err(StoreError::FieldTooLong);
        }
        let mut tables = self.inner.lock().unwrap();
        tables.writes += 1;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            middle_name: user.middle_name.clone(),
            gender: user.gender.clone(),
            email: user.email.clone(),
            phone_number: None,
            profile_picture: None,
            dob: None,
            created_at: now,
        };
        tables.credentials.push(Credential {
            user_id: created.id,
            password: password_hash.to_owned(),
            password_changed_at: now,
            password_reset_token: None,
            password_expires_on: None,
        });
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_credential(&self, user_id: Uuid) -> Result<Option<Credential>, StoreError> {
        Ok(self.credential_for(user_id))
    }

    async fn find_auth_subject(&self, user_id: Uuid) -> Result<Option<AuthSubject>, StoreError> {
        let tables = self.inner.lock().unwrap();
        let Some(user) = tables.users.iter().find(|u| u.id == user_id) else {
            return Ok(None);
        };
        Ok(tables
            .credentials
            .iter()
            .find(|c| c.user_id == user_id)
            .map(|c| AuthSubject {
                id: user.id,
                email: user.email.clone(),
                password_changed_at: c.password_changed_at,
            }))
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: &str,
        expires_on: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.update(user_id, |c| {
            c.password_reset_token = Some(digest.to_owned());
            c.password_expires_on = Some(expires_on);
        });
        Ok(())
    }

    async fn find_credential_by_reset_token(
        &self,
        digest: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .credentials
            .iter()
            .find(|c| c.password_reset_token.as_deref() == Some(digest))
            .cloned())
    }

    async fn clear_reset_token(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.update(user_id, |c| {
            c.password_reset_token = None;
            c.password_expires_on = None;
        });
        Ok(())
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        digest: &str,
        password_hash: &str,
        changed_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut tables = self.inner.lock().unwrap();
        tables.writes += 1;
        let Some(c) = tables.credentials.iter_mut().find(|c| {
            c.user_id == user_id && c.password_reset_token.as_deref() == Some(digest)
        }) else {
            return Ok(false);
        };
        c.password = password_hash.to_owned();
        c.password_changed_at = changed_at;
        c.password_reset_token = None;
        c.password_expires_on = None;
        Ok(true)
    }

    async fn change_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        changed_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.update(user_id, |c| {
            c.password = password_hash.to_owned();
            c.password_changed_at = changed_at;
        });
        Ok(())
    }
}
