use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_dummy, verify_password},
        repo::{StoreError, UniqueField},
        repo_types::{NewUser, User},
        validation::{check_login, check_signup, normalize_email},
    },
    error::AppError,
    state::AppState,
};

/// A user together with a freshly minted session token.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

fn issue_session(state: &AppState, user: User) -> Result<AuthSession, AppError> {
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    Ok(AuthSession { user, token })
}

/// Register a new account. Email collisions are reported before username ones.
#[instrument(skip(state, password))]
pub async fn signup(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<AuthSession, AppError> {
    let username = username.trim();
    let email = normalize_email(email);

    if let Err(e) = check_signup(username, &email, password).into_result() {
        warn!(error = %e, "signup rejected");
        return Err(e);
    }

    if state.store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(StoreError::Duplicate(UniqueField::Email).into());
    }
    if state.store.find_by_username(username).await?.is_some() {
        warn!(username = %username, "username already taken");
        return Err(StoreError::Duplicate(UniqueField::Username).into());
    }

    let hash = hash_password(password)?;
    let user = state
        .store
        .insert(NewUser {
            username,
            email: &email,
            password_hash: &hash,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    issue_session(state, user)
}

/// Authenticate by username or email. Unknown identifiers and wrong
/// passwords produce the same error.
#[instrument(skip(state, password))]
pub async fn login(state: &AppState, login: &str, password: &str) -> Result<AuthSession, AppError> {
    let login = login.trim();
    check_login(login, password).into_result()?;

    // A username may look like someone else's email, so both matches get a
    // password check.
    let by_username = state.store.find_by_username(login).await?;
    let by_email = state.store.find_by_email(&normalize_email(login)).await?;

    let mut candidates: Vec<User> = by_username.into_iter().collect();
    if let Some(u) = by_email {
        if candidates.iter().all(|c| c.id != u.id) {
            candidates.push(u);
        }
    }

    if candidates.is_empty() {
        verify_dummy(password);
        warn!("login unknown identifier");
        return Err(AppError::invalid_credentials());
    }

    for user in candidates {
        if verify_password(password, &user.password_hash)? {
            info!(user_id = %user.id, "user logged in");
            return issue_session(state, user);
        }
        warn!(user_id = %user.id, "login invalid password");
    }
    Err(AppError::invalid_credentials())
}
