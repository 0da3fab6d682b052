use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::orders::{CheckoutPreview, CheckoutResponse, OrderList, OrderWithItems, ShippingInfo},
    entity::{
        carts::Entity as Carts,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartOwner, Order, OrderItem, OrderStatus, PaymentStatus},
    payments::PaymentIntentRequest,
    pricing::generate_order_number,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service::{build_view, get_or_create_cart, load_lines},
    state::AppState,
};

const EMPTY_CART: &str = "Your cart is empty.";
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Inserts `order` under a fresh number from `next_number`, drawing again
/// when the number is already taken. Each attempt runs in a savepoint so a
/// collision leaves the surrounding transaction usable.
pub async fn insert_order<C, F>(
    conn: &C,
    order: OrderActive,
    mut next_number: F,
) -> AppResult<OrderModel>
where
    C: TransactionTrait,
    F: FnMut() -> String,
{
    let mut attempt = 1;
    loop {
        let mut active = order.clone();
        active.order_number = Set(next_number());

        let savepoint = conn.begin().await?;
        match active.insert(&savepoint).await {
            Ok(model) => {
                savepoint.commit().await?;
                return Ok(model);
            }
            Err(err) => {
                savepoint.rollback().await?;
                match err.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_))
                        if attempt < ORDER_NUMBER_ATTEMPTS =>
                    {
                        tracing::warn!(attempt, "order number collision, retrying");
                        attempt += 1;
                    }
                    _ => return Err(err.into()),
                }
            }
        }
    }
}

pub async fn checkout_preview(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutPreview>> {
    let owner = CartOwner::User(user.user_id);
    let cart = get_or_create_cart(&state.orm, &owner).await?;
    let rows = load_lines(&state.orm, cart.id).await?;
    if rows.is_empty() {
        return Err(AppError::BadRequest(EMPTY_CART.into()));
    }
    let view = build_view(&cart, &rows, &state.config.pricing)?;

    let account = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let form = ShippingInfo {
        first_name: account.first_name,
        last_name: account.last_name,
        email: account.email,
        ..ShippingInfo::default()
    };

    Ok(ApiResponse::success(
        "Checkout",
        CheckoutPreview { cart: view, form },
        None,
    ))
}

/// Snapshots the user's cart into a pending order, then asks the payment
/// provider for an intent. A provider failure deletes the order again.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: ShippingInfo,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    payload.validate()?;

    let owner = CartOwner::User(user.user_id);
    let cart = get_or_create_cart(&state.orm, &owner).await?;

    let txn = state.orm.begin().await?;

    // Serialises checkouts and webhook clears for this cart.
    Carts::find_by_id(cart.id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let rows = load_lines(&txn, cart.id).await?;
    if rows.is_empty() {
        return Err(AppError::BadRequest(EMPTY_CART.into()));
    }

    for row in &rows {
        if !row.available {
            return Err(AppError::BadRequest(format!(
                "{} is no longer available",
                row.name
            )));
        }
        if row.stock < row.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                row.name
            )));
        }
    }

    let view = build_view(&cart, &rows, &state.config.pricing)?;

    let ShippingInfo {
        first_name,
        last_name,
        email,
        phone,
        address,
        city,
        state: region,
        zip_code,
        country,
    } = payload;

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        order_number: NotSet,
        user_id: Set(user.user_id),
        cart_id: Set(cart.id),
        first_name: Set(first_name),
        last_name: Set(last_name),
        email: Set(email),
        phone: Set(phone),
        address: Set(address),
        city: Set(city),
        state: Set(region),
        zip_code: Set(zip_code),
        country: Set(country),
        subtotal: Set(view.subtotal),
        tax: Set(view.tax),
        shipping: Set(view.shipping),
        total: Set(view.total),
        payment_intent_id: Set(None),
        payment_status: Set(PaymentStatus::Pending),
        status: Set(OrderStatus::Pending),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let order = insert_order(&txn, order, generate_order_number).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            product_name: Set(row.name.clone()),
            product_price: Set(row.unit_price()),
            quantity: Set(row.quantity),
            total_price: Set(row.total_price()?),
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(item));
    }

    txn.commit().await?;
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = order.total,
        "order created"
    );

    let intent = state
        .payments
        .create_payment_intent(PaymentIntentRequest {
            amount: order.total,
            currency: state.config.stripe.currency.clone(),
            order_id: order.id,
            order_number: order.order_number.clone(),
        })
        .await;

    let intent = match intent {
        Ok(intent) => intent,
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "payment intent failed");
            discard_order(state, order.id).await;
            return Err(err.into());
        }
    };

    let mut active: OrderActive = order.clone().into();
    active.payment_intent_id = Set(Some(intent.id.clone()));
    let order = match active.update(&state.orm).await {
        Ok(order) => order,
        Err(err) => {
            discard_order(state, order.id).await;
            return Err(err.into());
        }
    };
    tracing::info!(order_id = %order.id, intent_id = %intent.id, "payment intent created");

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        CheckoutResponse {
            order: Order::from(order),
            items,
            client_secret: intent.client_secret,
            publishable_key: state.config.stripe.publishable_key.clone(),
        },
        Some(Meta::empty()),
    ))
}

/// Compensation for a failed payment step. Items go with the order.
async fn discard_order(state: &AppState, order_id: Uuid) {
    let result = async {
        let txn = state.orm.begin().await?;
        OrderItems::delete_many()
            .filter(OrderItemCol::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        Orders::delete_by_id(order_id).exec(&txn).await?;
        txn.commit().await?;
        Ok::<_, sea_orm::DbErr>(())
    }
    .await;

    match result {
        Ok(()) => tracing::info!(order_id = %order_id, "order rolled back"),
        Err(err) => tracing::error!(order_id = %order_id, error = %err, "order rollback failed"),
    }
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // Another user's order looks exactly like a missing one.
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let data = with_items(state, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn with_items(state: &AppState, order: OrderModel) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    Ok(OrderWithItems {
        order: Order::from(order),
        items,
    })
}
