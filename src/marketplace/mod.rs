//! Produce listings, per-user carts and checkout into orders.

mod dto;
pub mod handlers;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::marketplace_routes()
}
