use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            normalize_email, validated, AuthResponse, ChangePasswordRequest,
            ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser, RegisterRequest,
            ResetPasswordRequest,
        },
        extractors::{protect_route, AppJson, AuthUser},
        services::Session,
    },
    config::AppConfig,
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", post(reset_password))
}

/// Routes behind `protect_route`.
pub fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/user/change-password", post(change_password))
        .route("/user/profile", get(get_profile))
        .route_layer(middleware::from_fn_with_state(state, protect_route))
}

/// `Set-Cookie` value carrying the session token.
fn token_cookie(token: &str, config: &AppConfig) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "token={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        config.jwt.cookie_ttl_hours * 3600
    );
    if config.environment.is_production() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(AppError::internal)
}

fn session_response(
    state: &AppState,
    session: Session,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, token_cookie(&session.token.token, &state.config)?);
    Ok((
        headers,
        Json(AuthResponse::new(session.token.token, session.user)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AppError> {
    payload.email = normalize_email(&payload.email);
    let payload = validated(payload)?;

    let session = state.auth.register(payload.into()).await?;
    let (headers, body) = session_response(&state, session)?;
    Ok((StatusCode::CREATED, headers, body))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    payload.email = normalize_email(&payload.email);
    let payload = validated(payload)?;

    let session = state.auth.login(&payload.email, &payload.password).await?;
    session_response(&state, session)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.email = normalize_email(&payload.email);
    let payload = validated(payload)?;

    state.auth.forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::success()))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    let payload = validated(payload)?;
    if token.trim().is_empty() {
        return Err(AppError::missing_field());
    }

    let session = state
        .auth
        .reset_password(
            token.trim(),
            &payload.new_password,
            &payload.new_password_again,
        )
        .await?;
    session_response(&state, session)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let payload = validated(payload)?;
    state.auth.change_password(user.id, payload.into()).await?;
    Ok(Json(MessageResponse::success()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let profile = state.auth.profile(user.id).await?;
    Ok(Json(profile.into()))
}
