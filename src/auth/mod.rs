use crate::state::AppState;
use axum::Router;

pub mod code;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod service;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
