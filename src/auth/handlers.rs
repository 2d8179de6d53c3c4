use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, MeResponse,
            MessageResponse, ResetPasswordRequest, SignupRequest,
        },
        jwt::AuthUser,
        reset, services,
    },
    error::AppError,
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session =
        services::signup(&state, &payload.username, &payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            token: session.token,
            user: session.user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = services::login(&state, &payload.login, &payload.password).await?;
    Ok(Json(AuthResponse {
        success: true,
        token: session.token,
        user: session.user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AppError> {
    let issued = reset::request_reset(&state, &payload.email).await?;
    info!(
        expires_at = %issued.expires_at,
        exposed = state.config.reset.expose_token,
        "forgot-password handled"
    );
    let reset_token = state.config.reset.expose_token.then_some(issued.token);
    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: "Password reset link sent".into(),
        reset_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    reset::reset_password(&state, &payload.token, &payload.password).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Password reset successful".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let Some(user) = state.store.find_by_id(user_id).await? else {
        warn!(user_id = %user_id, "token for unknown user");
        return Err(AppError::NotFound("User not found".into()));
    };
    Ok(Json(MeResponse {
        success: true,
        user: user.into(),
    }))
}
