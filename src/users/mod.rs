use crate::state::AppState;
use axum::Router;

mod dto;
pub mod errors;
pub mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod repo;
pub mod repo_types;
pub mod store;
pub mod validation;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::api_routes())
}
