use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::cart::{
        AddToCartRequest, CartLine, CartProduct, CartView, MAX_LINE_QUANTITY, UpdateCartRequest,
    },
    entity::{
        cart_items::{self, ActiveModel as CartItemActive, Column as CartCol, Entity as CartItems},
        carts::{self, ActiveModel as CartActive, Column as CartsCol, Entity as Carts},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    models::CartOwner,
    pricing::{self, PricingPolicy},
    response::ApiResponse,
    state::AppState,
};

/// A cart line joined to the product it points at.
#[derive(Debug, Clone, FromQueryResult)]
pub struct CartLineRow {
    pub item_id: Uuid,
    pub quantity: i32,
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub stock: i32,
    pub available: bool,
}

impl CartLineRow {
    pub fn unit_price(&self) -> i64 {
        pricing::effective_price(self.price, self.sale_price)
    }

    pub fn total_price(&self) -> AppResult<i64> {
        pricing::line_total(self.unit_price(), self.quantity).ok_or_else(amount_overflow)
    }
}

fn amount_overflow() -> AppError {
    AppError::BadRequest("Cart amount is too large".into())
}

pub async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    owner: &CartOwner,
) -> AppResult<Option<carts::Model>> {
    let finder = match owner {
        CartOwner::User(user_id) => Carts::find().filter(CartsCol::UserId.eq(*user_id)),
        CartOwner::Session(key) => Carts::find().filter(CartsCol::SessionKey.eq(key.as_str())),
    };
    Ok(finder.one(conn).await?)
}

/// Returns the owner's single cart, creating it on first use.
///
/// Two concurrent first requests race on the unique owner columns; the loser
/// reads the row the winner inserted. Must not run inside a transaction, since
/// a failed insert aborts it.
pub async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    owner: &CartOwner,
) -> AppResult<carts::Model> {
    if let Some(cart) = find_cart(conn, owner).await? {
        return Ok(cart);
    }

    let (user_id, session_key) = match owner {
        CartOwner::User(user_id) => (Some(*user_id), None),
        CartOwner::Session(key) => (None, Some(key.clone())),
    };

    let inserted = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        session_key: Set(session_key),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(cart) => {
            tracing::debug!(cart_id = %cart.id, "cart created");
            Ok(cart)
        }
        Err(err) => match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => find_cart(conn, owner)
                .await?
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart vanished after conflict"))),
            _ => Err(err.into()),
        },
    }
}

pub async fn load_lines<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<Vec<CartLineRow>> {
    let rows = CartItems::find()
        .select_only()
        .column_as(CartCol::Id, "item_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(ProdCol::Id, "product_id")
        .column_as(ProdCol::Name, "name")
        .column_as(ProdCol::Slug, "slug")
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::SalePrice, "sale_price")
        .column_as(ProdCol::Stock, "stock")
        .column_as(ProdCol::Available, "available")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .filter(CartCol::CartId.eq(cart_id))
        .order_by_asc(CartCol::CreatedAt)
        .into_model::<CartLineRow>()
        .all(conn)
        .await?;
    Ok(rows)
}

/// Line totals, item count and the same tax/shipping preview checkout uses.
pub fn build_view(
    cart: &carts::Model,
    rows: &[CartLineRow],
    policy: &PricingPolicy,
) -> AppResult<CartView> {
    let mut items = Vec::with_capacity(rows.len());
    let mut item_count: i64 = 0;
    let mut subtotal: i64 = 0;

    for row in rows {
        let total_price = row.total_price()?;
        item_count += i64::from(row.quantity);
        subtotal = subtotal.checked_add(total_price).ok_or_else(amount_overflow)?;
        items.push(CartLine {
            id: row.item_id,
            product: CartProduct {
                id: row.product_id,
                name: row.name.clone(),
                slug: row.slug.clone(),
            },
            quantity: row.quantity,
            unit_price: row.unit_price(),
            total_price,
        });
    }

    let totals = policy.totals(subtotal).ok_or_else(amount_overflow)?;

    Ok(CartView {
        id: cart.id,
        session_key: cart.session_key.clone(),
        items,
        item_count,
        subtotal: totals.subtotal,
        tax: totals.tax,
        shipping: totals.shipping,
        total: totals.total,
    })
}

async fn render(state: &AppState, cart: &carts::Model) -> AppResult<CartView> {
    let rows = load_lines(&state.orm, cart.id).await?;
    build_view(cart, &rows, &state.config.pricing)
}

pub async fn view_cart(state: &AppState, owner: &CartOwner) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(&state.orm, owner).await?;
    let view = render(state, &cart).await?;
    Ok(ApiResponse::success("OK", view, None))
}

pub async fn add_item(
    state: &AppState,
    owner: &CartOwner,
    product_id: Uuid,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    payload.validate()?;
    let quantity = payload.quantity.unwrap_or(1);

    let product = Products::find_by_id(product_id)
        .filter(ProdCol::Available.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let cart = get_or_create_cart(&state.orm, owner).await?;

    let line = CartItemActive {
        id: Set(Uuid::new_v4()),
        cart_id: Set(cart.id),
        product_id: Set(product.id),
        quantity: Set(quantity),
        created_at: NotSet,
    };
    CartItems::insert(line)
        .on_conflict(
            OnConflict::columns([CartCol::CartId, CartCol::ProductId])
                .value(
                    CartCol::Quantity,
                    // Repeated adds saturate at the per-line cap.
                    Expr::cust_with_values(
                        "LEAST(cart_items.quantity + $1, $2)",
                        [quantity, MAX_LINE_QUANTITY],
                    ),
                )
                .to_owned(),
        )
        .exec(&state.orm)
        .await?;

    audit::record(
        &state.pool,
        user_id(owner),
        "cart_add",
        "cart_items",
        serde_json::json!({ "cart_id": cart.id, "product_id": product.id, "quantity": quantity }),
    )
    .await;

    let view = render(state, &cart).await?;
    Ok(ApiResponse::success(
        format!("{} added to cart", product.name),
        view,
        None,
    ))
}

/// Loads an item and the cart it lives in, rejecting other owners' carts.
async fn owned_item(
    state: &AppState,
    owner: &CartOwner,
    item_id: Uuid,
) -> AppResult<(cart_items::Model, carts::Model)> {
    let item = CartItems::find_by_id(item_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let cart = Carts::find_by_id(item.cart_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !owner.owns(&cart) {
        tracing::warn!(item_id = %item_id, cart_id = %cart.id, "cart ownership mismatch");
        return Err(AppError::Forbidden);
    }
    Ok((item, cart))
}

pub async fn remove_item(
    state: &AppState,
    owner: &CartOwner,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let (item, cart) = owned_item(state, owner, item_id).await?;
    CartItems::delete_by_id(item.id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        user_id(owner),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_id": cart.id, "product_id": item.product_id }),
    )
    .await;

    let view = render(state, &cart).await?;
    Ok(ApiResponse::success("Item removed from cart", view, None))
}

pub async fn update_quantity(
    state: &AppState,
    owner: &CartOwner,
    item_id: Uuid,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    payload.validate()?;
    let (item, cart) = owned_item(state, owner, item_id).await?;
    let quantity = payload.quantity;

    let message = if quantity <= 0 {
        CartItems::delete_by_id(item.id).exec(&state.orm).await?;
        "Item removed from cart"
    } else {
        let mut active: CartItemActive = item.clone().into();
        active.quantity = Set(quantity);
        active.update(&state.orm).await?;
        "Cart updated"
    };

    audit::record(
        &state.pool,
        user_id(owner),
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_id": cart.id, "product_id": item.product_id, "quantity": quantity }),
    )
    .await;

    let view = render(state, &cart).await?;
    Ok(ApiResponse::success(message, view, None))
}

pub async fn clear(state: &AppState, owner: &CartOwner) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(&state.orm, owner).await?;
    let deleted = clear_items(&state.orm, cart.id).await?;

    audit::record(
        &state.pool,
        user_id(owner),
        "cart_clear",
        "cart_items",
        serde_json::json!({ "cart_id": cart.id, "removed": deleted }),
    )
    .await;

    let view = render(state, &cart).await?;
    Ok(ApiResponse::success("Cart cleared", view, None))
}

/// Deletes every line of a cart; the cart row itself stays.
pub async fn clear_items<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(CartCol::CartId.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

fn user_id(owner: &CartOwner) -> Option<Uuid> {
    match owner {
        CartOwner::User(id) => Some(*id),
        CartOwner::Session(_) => None,
    }
}
