//! Payment provider seam: the checkout flow only sees [`PaymentGateway`].

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

pub use stripe::StripeGateway;

/// A charge the provider is asked to prepare for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub order_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Reference token stored on the order and echoed back by webhooks.
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a pending charge and returns its reference token.
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError>;
}
