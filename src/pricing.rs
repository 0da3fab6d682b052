//! Order money math. Every amount is an `i64` in minor currency units.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Serialize;
use utoipa::ToSchema;

const ORDER_NUMBER_PREFIX: &str = "SW";

/// Tax and shipping rules applied to a cart subtotal.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingPolicy {
    /// Fraction of the subtotal charged as tax, e.g. `0.08`.
    pub tax_rate: Decimal,
    /// Subtotals at or above this ship for free.
    pub free_shipping_threshold: i64,
    pub flat_shipping_fee: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: 10_000,
            flat_shipping_fee: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
}

impl PricingPolicy {
    /// Returns `None` when an amount does not fit in `i64`.
    pub fn totals(&self, subtotal: i64) -> Option<OrderTotals> {
        let tax = (Decimal::from(subtotal) * self.tax_rate)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()?;
        let shipping = if subtotal < self.free_shipping_threshold {
            self.flat_shipping_fee
        } else {
            0
        };
        let total = subtotal.checked_add(tax)?.checked_add(shipping)?;
        Some(OrderTotals {
            subtotal,
            tax,
            shipping,
            total,
        })
    }
}

/// Sale price wins only when it is actually lower than the list price.
pub fn effective_price(price: i64, sale_price: Option<i64>) -> i64 {
    match sale_price {
        Some(sale) if sale < price => sale,
        _ => price,
    }
}

pub fn line_total(unit_price: i64, quantity: i32) -> Option<i64> {
    unit_price.checked_mul(i64::from(quantity))
}

/// `SW` followed by 8 random uppercase hex characters.
pub fn generate_order_number() -> String {
    let bytes: [u8; 4] = rand::random();
    format!("{ORDER_NUMBER_PREFIX}{}", hex::encode_upper(bytes))
}
