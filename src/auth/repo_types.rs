use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub gender: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub dob: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Fields supplied at registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub gender: String,
    pub email: String,
}

/// Credential row; never serialized to clients.
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub user_id: Uuid,
    pub password: String, // Argon2 PHC string
    pub password_changed_at: OffsetDateTime,
    pub password_reset_token: Option<String>, // SHA-256 digest of the reset secret
    pub password_expires_on: Option<OffsetDateTime>,
}

/// What the authorization check needs from the users/credentials join.
#[derive(Debug, Clone, FromRow)]
pub struct AuthSubject {
    pub id: Uuid,
    pub email: String,
    pub password_changed_at: OffsetDateTime,
}
