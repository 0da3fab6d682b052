use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
};

use crate::{
    dto::{
        orders::OrderWithItems,
        payments::{PaymentCancelled, PaymentSuccessQuery, WebhookAck},
    },
    error::AppResult,
    payments::webhook::SIGNATURE_HEADER,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment/webhook", post(stripe_webhook))
        .route("/payment/webhook/", post(stripe_webhook))
        .route("/payment/success", get(payment_success))
        .route("/payment/success/", get(payment_success))
        .route("/payment/cancel", get(payment_cancel))
        .route("/payment/cancel/", get(payment_cancel))
}

#[utoipa::path(
    post,
    path = "/api/payment/webhook",
    params(("stripe-signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    request_body(content = String, content_type = "application/json", description = "Raw event payload"),
    responses(
        (status = 200, description = "Event acknowledged", body = ApiResponse<WebhookAck>),
        (status = 400, description = "Bad signature or payload"),
        (status = 404, description = "No order for this payment intent")
    ),
    tag = "Payments"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let resp = payment_service::handle_webhook(&state, signature, &body).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payment/success",
    params(("payment_intent" = String, Query, description = "Payment intent id")),
    responses(
        (status = 200, description = "Order paid with this intent", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found")
    ),
    tag = "Payments"
)]
pub async fn payment_success(
    State(state): State<AppState>,
    Query(query): Query<PaymentSuccessQuery>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = payment_service::payment_success(&state, query.payment_intent).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payment/cancel",
    responses(
        (status = 200, description = "Payment cancelled, back to the cart", body = ApiResponse<PaymentCancelled>)
    ),
    tag = "Payments"
)]
pub async fn payment_cancel() -> Json<ApiResponse<PaymentCancelled>> {
    Json(payment_service::payment_cancel())
}
