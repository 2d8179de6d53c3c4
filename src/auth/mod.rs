use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod notifier;
mod password;
pub mod repo;
pub mod repo_types;
pub mod reset;
mod reset_token;
pub mod services;
mod validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
