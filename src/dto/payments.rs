use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub status: String,
    pub event_type: String,
    /// False when the event was a replay or not one we act on.
    pub applied: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentSuccessQuery {
    pub payment_intent: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentCancelled {
    pub redirect: String,
}
