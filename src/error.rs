use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{
    auth::{jwt::TokenError, password::HashError, repo::StoreError},
    state::AppState,
};

const GENERIC_MESSAGE: &str = "Something went very wrong";

/// Every failure a request can end with. Expected failures carry their
/// client message; `Internal` hides its cause outside development.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("New password is the same as old password!")]
    PasswordUnchanged,
    #[error("Email already exists")]
    DuplicateEmail,
    #[error("You have exceeded a field limit. Please check your request and try again!")]
    FieldTooLong,
    #[error("There is a missing field in your request")]
    MissingField,
    #[error("Expected request with `Content-Type: application/json`")]
    UnsupportedMediaType,
    #[error("Email or Password is incorrect")]
    InvalidCredentials,
    #[error("You are not logged in. Please log in to get access")]
    Unauthenticated,
    #[error("Invalid token. Please log in again!")]
    TokenInvalid,
    #[error("Your token has expired. Please log in again!")]
    TokenExpired,
    #[error("The user with this token no longer exists")]
    UserGone,
    #[error("You recently changed your password, please log in again!")]
    PasswordChangedSince,
    #[error("There is no user with that email")]
    UserNotFound,
    #[error("Invalid Token")]
    InvalidToken,
    #[error("Password reset token has expired. Please repeat forgot password process.")]
    ResetTokenExpired,
    #[error("Something went very wrong")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn missing_field() -> Self {
        AppError::Validation("There is a missing field in your request".into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        AppError::Internal(err.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::PasswordMismatch
            | AppError::PasswordUnchanged
            | AppError::FieldTooLong
            | AppError::MissingField
            | AppError::InvalidCredentials
            | AppError::UserNotFound
            | AppError::InvalidToken
            | AppError::ResetTokenExpired => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Unauthenticated
            | AppError::TokenInvalid
            | AppError::TokenExpired
            | AppError::UserGone
            | AppError::PasswordChangedSince => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::FieldTooLong => AppError::FieldTooLong,
            StoreError::MissingField => AppError::MissingField,
            StoreError::Database(e) => AppError::internal(e),
        }
    }
}

/// Body rejections keep the JSON error shape; the parser's own text only
/// goes to the log.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(reason = %rejection.body_text(), "request body rejected");
        match rejection {
            JsonRejection::MissingJsonContentType(_) => AppError::UnsupportedMediaType,
            JsonRejection::JsonSyntaxError(_) => {
                AppError::Validation("Request body is not valid JSON".into())
            }
            _ => AppError::Validation("Invalid request body".into()),
        }
    }
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        AppError::internal(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::TokenInvalid,
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Signing(e) => AppError::internal(e),
        }
    }
}

/// Cause of a 500, kept on the response for [`expose_internal_detail`].
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            AppError::Internal(e) => {
                error!(error = %format!("{e:#}"), "internal error");
                Some(format!("{e:#}"))
            }
            other if status == StatusCode::UNAUTHORIZED => {
                warn!(reason = %other, "request rejected");
                None
            }
            _ => None,
        };

        let body = Json(json!({
            "status": if status.is_server_error() { "error" } else { "fail" },
            "message": self.to_string(),
        }));

        let mut res = (status, body).into_response();
        if let Some(detail) = detail {
            res.extensions_mut().insert(InternalDetail(detail));
        }
        res
    }
}

/// Adds the internal error chain to 500 responses in development mode.
pub async fn expose_internal_detail(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    if state.config.environment.is_production() {
        return res;
    }
    let Some(InternalDetail(detail)) = res.extensions_mut().remove::<InternalDetail>() else {
        return res;
    };
    (
        res.status(),
        Json(json!({
            "status": "error",
            "message": GENERIC_MESSAGE,
            "detail": detail,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateEmail.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::FieldTooLong.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::PasswordChangedSince.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::ResetTokenExpired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_errors_keep_their_kind() {
        assert!(matches!(AppError::from(TokenError::Invalid), AppError::TokenInvalid));
        assert!(matches!(AppError::from(TokenError::Expired), AppError::TokenExpired));
    }

    #[test]
    fn internal_message_hides_cause() {
        let err = AppError::internal(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), GENERIC_MESSAGE);
        let res = err.into_response();
        let detail = res.extensions().get::<InternalDetail>().unwrap();
        assert!(detail.0.contains("connection refused"));
    }
}
