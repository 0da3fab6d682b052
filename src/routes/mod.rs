use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payments;

// Build the API router without binding state; it will be provided at the top level.
// Storefront routers carry full paths because nesting at "/" is ambiguous.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(catalog::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(payments::router())
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
