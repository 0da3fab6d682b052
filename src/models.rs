use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{carts, categories, order_items, orders, products, users};

pub use crate::entity::orders::{OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub current_price: i64,
    pub on_sale: bool,
    pub stock: i32,
    pub available: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        let current_price = model.effective_price();
        Self {
            id: model.id,
            category_id: model.category_id,
            on_sale: current_price < model.price,
            current_price,
            name: model.name,
            slug: model.slug,
            description: model.description,
            price: model.price,
            sale_price: model.sale_price,
            stock: model.stock,
            available: model.available,
            featured: model.featured,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Who a cart belongs to. Exactly one of the two, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Session(String),
}

impl CartOwner {
    pub fn owns(&self, cart: &carts::Model) -> bool {
        match self {
            CartOwner::User(user_id) => cart.user_id == Some(*user_id),
            CartOwner::Session(key) => cart.session_key.as_deref() == Some(key.as_str()),
        }
    }

    pub fn session_key(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Session(key) => Some(key),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub cart_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub full_address: String,
    pub subtotal: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
    pub payment_intent_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        let full_name = format!("{} {}", model.first_name, model.last_name);
        let full_address = format!(
            "{}, {}, {} {}, {}",
            model.address, model.city, model.state, model.zip_code, model.country
        );
        Self {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            cart_id: model.cart_id,
            first_name: model.first_name,
            last_name: model.last_name,
            full_name,
            email: model.email,
            phone: model.phone,
            address: model.address,
            city: model.city,
            state: model.state,
            zip_code: model.zip_code,
            country: model.country,
            full_address,
            subtotal: model.subtotal,
            tax: model.tax,
            shipping: model.shipping,
            total: model.total,
            payment_intent_id: model.payment_intent_id,
            payment_status: model.payment_status,
            status: model.status,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: i64,
    pub quantity: i32,
    pub total_price: i64,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name: model.product_name,
            product_price: model.product_price,
            quantity: model.quantity,
            total_price: model.total_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn cart(user_id: Option<Uuid>, session_key: Option<&str>) -> carts::Model {
        let now = Utc::now().fixed_offset();
        carts::Model {
            id: Uuid::new_v4(),
            user_id,
            session_key: session_key.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn user_owner_matches_only_its_cart() {
        let user_id = Uuid::new_v4();
        let owner = CartOwner::User(user_id);
        assert!(owner.owns(&cart(Some(user_id), None)));
        assert!(!owner.owns(&cart(Some(Uuid::new_v4()), None)));
        assert!(!owner.owns(&cart(None, Some("abc"))));
    }

    #[test]
    fn session_owner_matches_only_its_cart() {
        let owner = CartOwner::Session("abc".into());
        assert!(owner.owns(&cart(None, Some("abc"))));
        assert!(!owner.owns(&cart(None, Some("abd"))));
        assert!(!owner.owns(&cart(Some(Uuid::new_v4()), None)));
        assert_eq!(owner.session_key(), Some("abc"));
        assert_eq!(CartOwner::User(Uuid::new_v4()).session_key(), None);
    }
}
