use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartView, UpdateCartRequest},
    error::AppResult,
    middleware::session::CartIdentity,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart_detail))
        .route("/cart/", get(cart_detail))
        .route("/cart/add/{product_id}", post(add_to_cart))
        .route("/cart/remove/{item_id}", post(remove_from_cart))
        .route("/cart/update/{item_id}", post(update_cart))
        .route("/cart/clear", post(clear_cart))
        .route("/cart/clear/", post(clear_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart/",
    params(("x-session-key" = Option<String>, Header, description = "Anonymous cart key")),
    responses(
        (status = 200, description = "Current cart with totals", body = ApiResponse<CartView>)
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_detail(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Response> {
    let resp = cart_service::view_cart(&state, &identity.owner).await?;
    Ok(identity.respond(Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/cart/add/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID"),
        ("x-session-key" = Option<String>, Header, description = "Anonymous cart key")
    ),
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added or quantity incremented", body = ApiResponse<CartView>),
        (status = 404, description = "Product not found or unavailable"),
        (status = 422, description = "Invalid quantity")
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(product_id): Path<Uuid>,
    payload: Option<Json<AddToCartRequest>>,
) -> AppResult<Response> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = cart_service::add_item(&state, &identity.owner, product_id, payload).await?;
    Ok(identity.respond(Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/cart/remove/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Cart item ID"),
        ("x-session-key" = Option<String>, Header, description = "Anonymous cart key")
    ),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<CartView>),
        (status = 403, description = "Item belongs to another cart"),
        (status = 404, description = "Cart item not found")
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<Uuid>,
) -> AppResult<Response> {
    let resp = cart_service::remove_item(&state, &identity.owner, item_id).await?;
    Ok(identity.respond(Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/cart/update/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Cart item ID"),
        ("x-session-key" = Option<String>, Header, description = "Anonymous cart key")
    ),
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Quantity set; zero or less removes the line", body = ApiResponse<CartView>),
        (status = 403, description = "Item belongs to another cart"),
        (status = 404, description = "Cart item not found")
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartRequest>,
) -> AppResult<Response> {
    let resp = cart_service::update_quantity(&state, &identity.owner, item_id, payload).await?;
    Ok(identity.respond(Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/cart/clear/",
    params(("x-session-key" = Option<String>, Header, description = "Anonymous cart key")),
    responses(
        (status = 200, description = "All items removed", body = ApiResponse<CartView>)
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Response> {
    let resp = cart_service::clear(&state, &identity.owner).await?;
    Ok(identity.respond(Json(resp)))
}
