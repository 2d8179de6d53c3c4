use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        password::hash_password,
        reset_token,
        validation::{check_email, check_new_password, normalize_email},
    },
    error::{AppError, ValidationErrors},
    state::AppState,
};

const INVALID_TOKEN: &str = "Invalid or expired token";

/// A reset token as handed to its owner. Only `reset_token::hash(&token)` is stored.
#[derive(Debug)]
pub struct IssuedReset {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Issue a reset token for `email`, replacing any earlier one for that user.
#[instrument(skip(state))]
pub async fn request_reset(state: &AppState, email: &str) -> Result<IssuedReset, AppError> {
    let email = normalize_email(email);
    let mut errors = ValidationErrors::default();
    check_email(&mut errors, &email);
    errors.into_result()?;

    let Some(user) = state.store.find_by_email(&email).await? else {
        warn!(email = %email, "reset requested for unknown email");
        return Err(AppError::NotFound("No account found with that email".into()));
    };

    let token = reset_token::generate();
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(state.config.reset.ttl_minutes);
    state
        .store
        .set_reset_token(user.id, &reset_token::hash(&token), expires_at)
        .await?;

    if let Err(e) = state.notifier.send_reset(&user, &token, expires_at).await {
        error!(error = %e, user_id = %user.id, "reset delivery failed");
        return Err(AppError::Internal(e));
    }

    info!(user_id = %user.id, "reset token issued");
    Ok(IssuedReset { token, expires_at })
}

/// Consume a live reset token and set a new password.
#[instrument(skip(state, token, new_password))]
pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AppError> {
    let mut errors = ValidationErrors::default();
    check_new_password(&mut errors, new_password);
    errors.into_result()?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::validation("token", INVALID_TOKEN));
    }

    let token_hash = reset_token::hash(token);
    let now = OffsetDateTime::now_utc();
    if state
        .store
        .find_by_reset_token(&token_hash, now)
        .await?
        .is_none()
    {
        warn!("reset with invalid or expired token");
        return Err(AppError::validation("token", INVALID_TOKEN));
    }

    let new_hash = hash_password(new_password)?;
    match state
        .store
        .consume_reset_token(&token_hash, now, &new_hash)
        .await?
    {
        Some(user_id) => {
            info!(user_id = %user_id, "password reset completed");
            Ok(())
        }
        None => {
            warn!("reset token consumed concurrently");
            Err(AppError::validation("token", INVALID_TOKEN))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::{login, signup};

    async fn seeded() -> AppState {
        let state = AppState::fake();
        signup(&state, "resetuser", "reset@example.com", "oldpassword123")
            .await
            .unwrap();
        state
    }

    fn is_invalid_token(err: &AppError) -> bool {
        matches!(err, AppError::Validation(v) if v.has("token")) && err.to_string() == INVALID_TOKEN
    }

    #[tokio::test]
    async fn request_then_reset_round_trip() {
        let state = seeded().await;
        let issued = request_reset(&state, "reset@example.com").await.unwrap();
        assert!(issued.expires_at > OffsetDateTime::now_utc());

        reset_password(&state, &issued.token, "newpassword123")
            .await
            .unwrap();

        login(&state, "reset@example.com", "newpassword123")
            .await
            .unwrap();
        let err = login(&state, "reset@example.com", "oldpassword123")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn only_the_hash_is_stored() {
        let state = seeded().await;
        let issued = request_reset(&state, "reset@example.com").await.unwrap();

        let user = state
            .store
            .find_by_email("reset@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            user.reset_token_hash.as_deref(),
            Some(reset_token::hash(&issued.token).as_str())
        );
        assert_eq!(user.reset_token_expires_at, Some(issued.expires_at));
    }

    #[tokio::test]
    async fn consumed_token_cannot_be_reused() {
        let state = seeded().await;
        let issued = request_reset(&state, "reset@example.com").await.unwrap();
        reset_password(&state, &issued.token, "newpassword123")
            .await
            .unwrap();

        let err = reset_password(&state, &issued.token, "another123")
            .await
            .unwrap_err();
        assert!(is_invalid_token(&err));

        let user = state
            .store
            .find_by_email("reset@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.reset_token_hash.is_none());
        assert!(user.reset_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn newer_token_supersedes_older() {
        let state = seeded().await;
        let first = request_reset(&state, "reset@example.com").await.unwrap();
        let second = request_reset(&state, "reset@example.com").await.unwrap();

        let err = reset_password(&state, &first.token, "newpassword123")
            .await
            .unwrap_err();
        assert!(is_invalid_token(&err));
        reset_password(&state, &second.token, "newpassword123")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let state = seeded().await.with_config(|c| c.reset.ttl_minutes = -1);
        let issued = request_reset(&state, "reset@example.com").await.unwrap();

        let err = reset_password(&state, &issued.token, "newpassword123")
            .await
            .unwrap_err();
        assert!(is_invalid_token(&err));
        login(&state, "resetuser", "oldpassword123").await.unwrap();
    }

    #[tokio::test]
    async fn short_password_leaves_token_live() {
        let state = seeded().await;
        let issued = request_reset(&state, "reset@example.com").await.unwrap();

        let err = reset_password(&state, &issued.token, "12345")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref v) if v.has("password")));

        reset_password(&state, &issued.token, "123456").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let state = seeded().await;
        let err = reset_password(&state, "invalidtoken123", "newpassword123")
            .await
            .unwrap_err();
        assert!(is_invalid_token(&err));
    }

    #[tokio::test]
    async fn request_reset_validates_and_looks_up_email() {
        let state = seeded().await;
        let err = request_reset(&state, "invalid-email").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = request_reset(&state, "nonexistent@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
