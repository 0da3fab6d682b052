#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use storefront_api::{
    config::{AdminSiteConfig, AppConfig, StripeConfig},
    db::{create_pool, run_migrations},
    dto::orders::ShippingInfo,
    entity::{
        categories::{self, ActiveModel as CategoryActive},
        products::{self, ActiveModel as ProductActive},
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    payments::{MockPaymentGateway, PaymentGateway, PaymentIntent},
    pricing::PricingPolicy,
    state::AppState,
};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Integration tests need a real Postgres; they skip when none is configured.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            None
        }
    }
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-jwt-secret".into(),
        stripe: StripeConfig {
            publishable_key: "pk_test".into(),
            secret_key: "sk_test".into(),
            webhook_secret: WEBHOOK_SECRET.into(),
            api_base: "http://127.0.0.1:9".into(),
            currency: "usd".into(),
            webhook_tolerance_secs: 300,
        },
        pricing: PricingPolicy::default(),
        admin_site: AdminSiteConfig {
            site_header: "Side Wind Admin".into(),
            site_title: "Side Wind Admin Portal".into(),
            index_title: "Welcome to Side Wind Admin Portal".into(),
        },
    }
}

pub async fn setup_state(
    database_url: &str,
    payments: impl PaymentGateway + 'static,
) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    Ok(AppState::new(pool, test_config(database_url), Arc::new(payments)))
}

/// Gateway that hands out an intent derived from the order id.
pub fn accepting_gateway() -> MockPaymentGateway {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_create_payment_intent().returning(|request| {
        Ok(PaymentIntent {
            id: intent_id_for(request.order_id),
            client_secret: format!("{}_secret", intent_id_for(request.order_id)),
        })
    });
    gateway
}

pub fn intent_id_for(order_id: Uuid) -> String {
    format!("pi_{}", order_id.simple())
}

/// Short unique suffix so parallel tests never share rows.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let username = unique(role);
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username.clone()),
        email: Set(format!("{username}@example.com")),
        first_name: Set("Jane".into()),
        last_name: Set("Doe".into()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_category(state: &AppState) -> anyhow::Result<categories::Model> {
    let slug = unique("category");
    Ok(CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(slug.clone()),
        slug: Set(slug),
        description: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?)
}

pub async fn create_product(
    state: &AppState,
    category: &categories::Model,
    price: i64,
    sale_price: Option<i64>,
    stock: i32,
) -> anyhow::Result<products::Model> {
    let slug = unique("product");
    Ok(ProductActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(category.id),
        name: Set(format!("Product {slug}")),
        slug: Set(slug),
        description: Set(Some("Test product".into())),
        price: Set(price),
        sale_price: Set(sale_price),
        stock: Set(stock),
        available: Set(true),
        featured: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?)
}

pub fn shipping_info() -> ShippingInfo {
    ShippingInfo {
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        email: "jane@example.com".into(),
        phone: "5551234567".into(),
        address: "1 Main St".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        zip_code: "62701".into(),
        country: "USA".into(),
    }
}
