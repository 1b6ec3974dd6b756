use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    auth::{
        repo_types::{NewUser, User},
        services::{PasswordChange, Registration},
    },
    error::AppError,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(email) {
        return Ok(());
    }
    let mut err = ValidationError::new("email");
    err.message = Some("Please provide a valid email".into());
    Err(err)
}

fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    if matches!(gender, "male" | "female") {
        return Ok(());
    }
    let mut err = ValidationError::new("gender");
    err.message = Some("Gender must be either male or female".into());
    Err(err)
}

/// Reads `null` as an empty string so it trips the same `length` rule as an
/// absent key.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Runs the derive rules. A missing (empty) field wins over any other
/// complaint so the client always gets the same message for it.
pub fn validated<T: Validate>(payload: T) -> Result<T, AppError> {
    match payload.validate() {
        Ok(()) => Ok(payload),
        Err(errors) => Err(validation_error(&errors)),
    }
}

fn validation_error(errors: &ValidationErrors) -> AppError {
    let fields = errors.field_errors();
    let all = || fields.values().flat_map(|errs| errs.iter());

    if all().any(|e| e.code == "length") {
        return AppError::missing_field();
    }
    let message = all()
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string());
    AppError::Validation(message)
}

/// Request body for user registration.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub first_name: String,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub last_name: String,
    pub middle_name: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1), custom = "validate_email")]
    pub email: String,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1), custom = "validate_gender")]
    pub gender: String,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(rename = "passwordAgain", deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub password_again: String,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            user: NewUser {
                first_name: req.first_name,
                last_name: req.last_name,
                middle_name: req.middle_name.filter(|m| !m.trim().is_empty()),
                gender: req.gender,
                email: req.email,
            },
            password: req.password,
            password_again: req.password_again,
        }
    }
}

/// Request body for login.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub email: String,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub new_password: String,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub new_password_again: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub old_password: String,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub new_password: String,
    #[serde(deserialize_with = "null_as_empty")]
    #[validate(length(min = 1))]
    pub new_password_again: String,
}

impl From<ChangePasswordRequest> for PasswordChange {
    fn from(req: ChangePasswordRequest) -> Self {
        PasswordChange {
            old_password: req.old_password,
            new_password: req.new_password,
            new_password_again: req.new_password_again,
        }
    }
}

/// Response returned after register, login or reset.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

impl AuthResponse {
    pub fn new(token: String, user: Option<User>) -> Self {
        Self {
            message: "success",
            token,
            user: user.map(PublicUser::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn success() -> Self {
        Self { message: "success" }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub gender: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub dob: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            middle_name: user.middle_name,
            gender: user.gender,
            email: user.email,
            phone_number: user.phone_number,
            profile_picture: user.profile_picture,
            dob: user.dob,
            created_at: user.created_at,
        }
    }
}
