mod common;

use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    Set, SqlErr, TransactionTrait,
};
use storefront_api::{
    dto::{cart::AddToCartRequest, orders::ShippingInfo},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::ActiveModel as ProductActive,
    },
    error::AppError,
    models::{CartOwner, OrderStatus, PaymentStatus},
    payments::{MockPaymentGateway, PaymentError},
    routes::{
        admin::{InventoryAdjustRequest, LowStockQuery, UpdateOrderStatusRequest},
        params::{AdminOrderQuery, OrderListQuery},
    },
    services::{admin_service, cart_service, order_service},
    state::AppState,
};
use uuid::Uuid;

async fn fill_cart(
    state: &AppState,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_item(
        state,
        &CartOwner::User(user_id),
        product_id,
        AddToCartRequest {
            quantity: Some(quantity),
        },
    )
    .await?;
    Ok(())
}

async fn order_count(state: &AppState, user_id: Uuid) -> anyhow::Result<u64> {
    Ok(Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .count(&state.orm)
        .await?)
}

#[tokio::test]
async fn checkout_snapshots_cart_into_pending_order() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_create_payment_intent()
        .withf(|request| request.amount == 12_960 && request.currency == "usd")
        .times(1)
        .returning(|request| {
            Ok(storefront_api::payments::PaymentIntent {
                id: common::intent_id_for(request.order_id),
                client_secret: "cs_test".into(),
            })
        });
    let state = common::setup_state(&url, gateway).await?;
    let category = common::create_category(&state).await?;
    let product = common::create_product(&state, &category, 7_000, Some(6_000), 10).await?;
    let user = common::create_user(&state, "user").await?;
    fill_cart(&state, user.user_id, product.id, 2).await?;

    let resp = order_service::checkout(&state, &user, common::shipping_info())
        .await?
        .data
        .expect("checkout response");

    let order = resp.order;
    assert!(order.order_number.starts_with("SW"));
    assert_eq!(order.subtotal, 12_000);
    assert_eq!(order.tax, 960);
    assert_eq!(order.shipping, 0);
    assert_eq!(order.total, 12_960);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(
        order.payment_intent_id.as_deref(),
        Some(common::intent_id_for(order.id).as_str())
    );
    assert_eq!(order.full_name, "Jane Doe");
    assert_eq!(resp.client_secret, "cs_test");
    assert_eq!(resp.publishable_key, "pk_test");

    assert_eq!(resp.items.len(), 1);
    assert_eq!(resp.items[0].product_price, 6_000);
    assert_eq!(resp.items[0].total_price, 12_000);

    // Checkout leaves the cart alone; the paid webhook empties it.
    let cart = cart_service::view_cart(&state, &CartOwner::User(user.user_id))
        .await?
        .data
        .expect("cart view");
    assert_eq!(cart.item_count, 2);

    // Later price changes never reach the order.
    let mut repriced: ProductActive = product.into();
    repriced.price = Set(9_900);
    repriced.sale_price = Set(None);
    repriced.update(&state.orm).await?;

    let stored = order_service::get_order(&state, &user, order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(stored.items[0].product_price, 6_000);
    assert_eq!(stored.items[0].total_price, 12_000);
    assert_eq!(stored.order.total, 12_960);
    Ok(())
}

#[tokio::test]
async fn small_order_pays_flat_shipping() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&url, common::accepting_gateway()).await?;
    let category = common::create_category(&state).await?;
    let product = common::create_product(&state, &category, 2_500, None, 10).await?;
    let user = common::create_user(&state, "user").await?;
    fill_cart(&state, user.user_id, product.id, 2).await?;

    let order = order_service::checkout(&state, &user, common::shipping_info())
        .await?
        .data
        .expect("checkout response")
        .order;
    assert_eq!(order.subtotal, 5_000);
    assert_eq!(order.tax, 400);
    assert_eq!(order.shipping, 1_000);
    assert_eq!(order.total, 6_400);
    Ok(())
}

#[tokio::test]
async fn empty_cart_checkout_creates_no_order() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_create_payment_intent().never();
    let state = common::setup_state(&url, gateway).await?;
    let user = common::create_user(&state, "user").await?;

    let result = order_service::checkout(&state, &user, common::shipping_info()).await;
    match result {
        Err(AppError::BadRequest(message)) => assert_eq!(message, "Your cart is empty."),
        other => panic!("expected empty cart error, got {other:?}"),
    }
    assert_eq!(order_count(&state, user.user_id).await?, 0);

    let preview = order_service::checkout_preview(&state, &user).await;
    assert!(matches!(preview, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn provider_failure_rolls_back_order_and_keeps_cart() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_create_payment_intent()
        .times(1)
        .returning(|_| Err(PaymentError::Rejected("Your card was declined.".into())));
    let state = common::setup_state(&url, gateway).await?;
    let category = common::create_category(&state).await?;
    let product = common::create_product(&state, &category, 3_000, None, 10).await?;
    let user = common::create_user(&state, "user").await?;
    fill_cart(&state, user.user_id, product.id, 1).await?;

    let result = order_service::checkout(&state, &user, common::shipping_info()).await;
    let err = result.expect_err("provider failure must surface");
    assert!(matches!(err, AppError::Payment(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);

    assert_eq!(order_count(&state, user.user_id).await?, 0);
    let cart = cart_service::view_cart(&state, &CartOwner::User(user.user_id))
        .await?
        .data
        .expect("cart view");
    assert_eq!(cart.item_count, 1);
    Ok(())
}

#[tokio::test]
async fn checkout_validates_shipping_and_stock() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_create_payment_intent().never();
    let state = common::setup_state(&url, gateway).await?;
    let category = common::create_category(&state).await?;
    let product = common::create_product(&state, &category, 3_000, None, 1).await?;
    let user = common::create_user(&state, "user").await?;
    fill_cart(&state, user.user_id, product.id, 2).await?;

    let invalid = ShippingInfo {
        email: "not-an-email".into(),
        zip_code: "12345678901".into(),
        ..common::shipping_info()
    };
    let result = order_service::checkout(&state, &user, invalid).await;
    match result {
        Err(AppError::Validation(errors)) => {
            let fields = errors.field_errors();
            assert!(fields.contains_key("email"));
            assert!(fields.contains_key("zip_code"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let short = order_service::checkout(&state, &user, common::shipping_info()).await;
    assert!(matches!(short, Err(AppError::BadRequest(message)) if message.starts_with("Insufficient stock")));
    assert_eq!(order_count(&state, user.user_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_order_number_is_rejected_and_redrawn() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&url, common::accepting_gateway()).await?;
    let category = common::create_category(&state).await?;
    let product = common::create_product(&state, &category, 3_000, None, 10).await?;
    let user = common::create_user(&state, "user").await?;
    fill_cart(&state, user.user_id, product.id, 1).await?;

    let order = order_service::checkout(&state, &user, common::shipping_info())
        .await?
        .data
        .expect("checkout response")
        .order;

    let info = common::shipping_info();
    let blank = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: NotSet,
        user_id: Set(user.user_id),
        cart_id: Set(order.cart_id),
        first_name: Set(info.first_name),
        last_name: Set(info.last_name),
        email: Set(info.email),
        phone: Set(info.phone),
        address: Set(info.address),
        city: Set(info.city),
        state: Set(info.state),
        zip_code: Set(info.zip_code),
        country: Set(info.country),
        subtotal: Set(0),
        tax: Set(0),
        shipping: Set(0),
        total: Set(0),
        payment_intent_id: Set(None),
        payment_status: Set(PaymentStatus::Pending),
        status: Set(OrderStatus::Pending),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    };

    let mut duplicate = blank.clone();
    duplicate.order_number = Set(order.order_number.clone());
    let err = duplicate
        .insert(&state.orm)
        .await
        .expect_err("order numbers are unique");
    assert!(matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ));

    // A colliding number is redrawn inside the same transaction.
    let fresh = format!("SWT{}", &Uuid::new_v4().simple().to_string()[..8]);
    let mut numbers = vec![fresh.clone(), order.order_number.clone()];
    let txn = state.orm.begin().await?;
    let inserted = order_service::insert_order(&txn, blank.clone(), || {
        numbers.pop().expect("number")
    })
    .await?;
    txn.commit().await?;
    assert_eq!(inserted.order_number, fresh);

    // Colliding every time gives up with the database error.
    let txn = state.orm.begin().await?;
    let taken = order.order_number.clone();
    let mut blank = blank;
    blank.id = Set(Uuid::new_v4());
    let exhausted = order_service::insert_order(&txn, blank, || taken.clone()).await;
    txn.rollback().await?;
    assert!(matches!(exhausted, Err(AppError::OrmError(_))));
    Ok(())
}

#[tokio::test]
async fn orders_are_private_to_their_owner() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&url, common::accepting_gateway()).await?;
    let category = common::create_category(&state).await?;
    let product = common::create_product(&state, &category, 3_000, None, 10).await?;
    let owner = common::create_user(&state, "user").await?;
    let stranger = common::create_user(&state, "user").await?;
    fill_cart(&state, owner.user_id, product.id, 1).await?;

    let order = order_service::checkout(&state, &owner, common::shipping_info())
        .await?
        .data
        .expect("checkout response")
        .order;

    let hidden = order_service::get_order(&state, &stranger, order.id).await;
    assert!(matches!(hidden, Err(AppError::NotFound)));

    let mine = order_service::list_orders(&state, &owner, OrderListQuery::default()).await?;
    assert_eq!(mine.meta.and_then(|m| m.total), Some(1));

    let theirs = order_service::list_orders(&state, &stranger, OrderListQuery::default()).await?;
    assert!(theirs.data.expect("orders").items.is_empty());
    Ok(())
}

#[tokio::test]
async fn admin_manages_orders_and_inventory() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&url, common::accepting_gateway()).await?;
    let category = common::create_category(&state).await?;
    let product = common::create_product(&state, &category, 3_000, None, 4).await?;
    let user = common::create_user(&state, "user").await?;
    let admin = common::create_user(&state, "admin").await?;
    fill_cart(&state, user.user_id, product.id, 1).await?;

    let order = order_service::checkout(&state, &user, common::shipping_info())
        .await?
        .data
        .expect("checkout response")
        .order;

    let forbidden = admin_service::list_all_orders(&state, &user, AdminOrderQuery::default()).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let found = admin_service::list_all_orders(
        &state,
        &admin,
        AdminOrderQuery {
            q: Some(order.order_number.clone()),
            ..AdminOrderQuery::default()
        },
    )
    .await?;
    let items = found.data.expect("orders").items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, order.id);

    let updated = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await?;
    assert_eq!(updated.data.expect("order").status, OrderStatus::Shipped);

    let low = admin_service::list_low_stock(
        &state,
        &admin,
        LowStockQuery {
            page: Some(1),
            per_page: Some(100),
            threshold: Some(4),
        },
    )
    .await?;
    assert!(low.data.expect("products").items.iter().any(|p| p.id == product.id));

    let negative = admin_service::adjust_inventory(
        &state,
        &admin,
        product.id,
        InventoryAdjustRequest { delta: -5 },
    )
    .await;
    assert!(matches!(negative, Err(AppError::BadRequest(_))));

    let restocked = admin_service::adjust_inventory(
        &state,
        &admin,
        product.id,
        InventoryAdjustRequest { delta: 6 },
    )
    .await?;
    assert_eq!(restocked.data.expect("product").stock, 10);

    let site = admin_service::site(&admin, &state.admin_site)?;
    assert_eq!(site.data.expect("site").site_header, "Side Wind Admin");
    Ok(())
}
