use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        orders::OrderWithItems,
        payments::{PaymentCancelled, WebhookAck},
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Entity as Products},
    },
    error::{AppError, AppResult},
    models::{OrderStatus, PaymentStatus},
    payments::webhook::{self, PaymentEvent, PaymentIntentObject},
    response::ApiResponse,
    services::{cart_service::clear_items, order_service::with_items},
    state::AppState,
};

/// Verifies and applies a provider callback.
///
/// The signature is checked before anything touches the database. Every
/// state change re-reads the order under a row lock, so replays are no-ops.
pub async fn handle_webhook(
    state: &AppState,
    signature: Option<&str>,
    payload: &[u8],
) -> AppResult<ApiResponse<WebhookAck>> {
    let stripe = &state.config.stripe;
    let event = webhook::construct_event(
        payload,
        signature,
        &stripe.webhook_secret,
        stripe.webhook_tolerance_secs,
    )
    .inspect_err(|err| tracing::warn!(error = %err, "webhook rejected"))?;

    let (event_type, applied) = match &event.event {
        PaymentEvent::Succeeded(intent) => (
            webhook::PAYMENT_SUCCEEDED.to_string(),
            mark_paid(state, intent).await?,
        ),
        PaymentEvent::Failed(intent) => (
            webhook::PAYMENT_FAILED.to_string(),
            mark_failed(state, intent).await?,
        ),
        PaymentEvent::Other(kind) => {
            tracing::debug!(event_type = %kind, "webhook event ignored");
            (kind.clone(), false)
        }
    };

    tracing::info!(
        event_id = event.id.as_deref().unwrap_or("-"),
        event_type = %event_type,
        applied,
        "webhook processed"
    );

    Ok(ApiResponse::success(
        "Webhook received",
        WebhookAck {
            status: "success".to_string(),
            event_type,
            applied,
        },
        None,
    ))
}

/// Finds the order an intent belongs to: by stored intent id, then by the
/// `order_id` metadata the checkout attached. Locks the row.
async fn locate_order(
    txn: &DatabaseTransaction,
    intent: &PaymentIntentObject,
) -> AppResult<OrderModel> {
    let by_token = Orders::find()
        .filter(OrderCol::PaymentIntentId.eq(intent.id.as_str()))
        .lock_exclusive()
        .one(txn)
        .await?;
    if let Some(order) = by_token {
        return Ok(order);
    }

    let order_id = intent
        .metadata
        .order_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(AppError::NotFound)?;

    let order = Orders::find_by_id(order_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;

    // Metadata must not re-point an order that already holds another intent.
    match order.payment_intent_id.as_deref() {
        Some(stored) if stored != intent.id => Err(AppError::NotFound),
        _ => Ok(order),
    }
}

async fn mark_paid(state: &AppState, intent: &PaymentIntentObject) -> AppResult<bool> {
    let txn = state.orm.begin().await?;
    let order = locate_order(&txn, intent).await.inspect_err(|_| {
        tracing::warn!(intent_id = %intent.id, "webhook for unknown order");
    })?;

    if order.payment_status == PaymentStatus::Paid {
        return Ok(false);
    }

    let order_id = order.id;
    let cart_id = order.cart_id;
    let now = Utc::now().fixed_offset();

    let mut active: OrderActive = order.into();
    active.payment_status = Set(PaymentStatus::Paid);
    active.status = Set(OrderStatus::Processing);
    active.payment_intent_id = Set(Some(intent.id.clone()));
    active.paid_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(&txn).await?;

    let cleared = clear_items(&txn, cart_id).await?;
    release_stock(&txn, order_id).await?;

    txn.commit().await?;
    tracing::info!(order_id = %order_id, cleared, "order paid");

    audit::record(
        &state.pool,
        None,
        "payment_succeeded",
        "orders",
        serde_json::json!({ "order_id": order_id, "payment_intent": intent.id }),
    )
    .await;

    Ok(true)
}

/// Takes the sold quantities out of stock, never below zero.
async fn release_stock(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(txn)
        .await?;

    for item in items {
        let Some(product) = Products::find_by_id(item.product_id)
            .lock_exclusive()
            .one(txn)
            .await?
        else {
            continue;
        };
        let stock = (product.stock - item.quantity).max(0);
        let mut active: ProductActive = product.into();
        active.stock = Set(stock);
        active.updated_at = Set(Utc::now().fixed_offset());
        active.update(txn).await?;
    }
    Ok(())
}

async fn mark_failed(state: &AppState, intent: &PaymentIntentObject) -> AppResult<bool> {
    let txn = state.orm.begin().await?;
    let order = locate_order(&txn, intent).await.inspect_err(|_| {
        tracing::warn!(intent_id = %intent.id, "webhook for unknown order");
    })?;

    // A late failure never downgrades a paid order.
    if matches!(
        order.payment_status,
        PaymentStatus::Failed | PaymentStatus::Paid
    ) {
        return Ok(false);
    }

    let order_id = order.id;
    let mut active: OrderActive = order.into();
    active.payment_status = Set(PaymentStatus::Failed);
    active.status = Set(OrderStatus::Cancelled);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&txn).await?;

    txn.commit().await?;
    tracing::info!(order_id = %order_id, "order payment failed");

    audit::record(
        &state.pool,
        None,
        "payment_failed",
        "orders",
        serde_json::json!({ "order_id": order_id, "payment_intent": intent.id }),
    )
    .await;

    Ok(true)
}

pub async fn payment_success(
    state: &AppState,
    payment_intent: Option<String>,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let intent_id = payment_intent
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("payment_intent is required".into()))?;

    let order = Orders::find()
        .filter(OrderCol::PaymentIntentId.eq(intent_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let data = with_items(state, order).await?;
    Ok(ApiResponse::success(
        "Thank you for your order!",
        data,
        None,
    ))
}

pub fn payment_cancel() -> ApiResponse<PaymentCancelled> {
    ApiResponse::success(
        "Payment was cancelled.",
        PaymentCancelled {
            redirect: "/api/cart/".to_string(),
        },
        None,
    )
}
