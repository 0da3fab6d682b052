use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 999;

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct AddToCartRequest {
    /// Defaults to 1.
    #[validate(range(
        min = 1,
        max = MAX_LINE_QUANTITY,
        message = "quantity must be between 1 and 999"
    ))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateCartRequest {
    /// Zero or less removes the line.
    #[validate(range(max = MAX_LINE_QUANTITY, message = "quantity must be at most 999"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartProduct {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub product: CartProduct,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    /// Set for anonymous carts; replay it in the `x-session-key` header.
    pub session_key: Option<String>,
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct CartSummary {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_key: Option<String>,
    pub item_count: i64,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummaryList {
    pub items: Vec<CartSummary>,
}
