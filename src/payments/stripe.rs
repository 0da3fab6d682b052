//! Stripe REST client (no SDK dependency).

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::StripeConfig;

use super::{PaymentError, PaymentGateway, PaymentIntent, PaymentIntentRequest};

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    id: String,
    client_secret: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let amount = request.amount.to_string();
        let order_id = request.order_id.to_string();

        let resp = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", request.currency.as_str()),
                ("metadata[order_id]", order_id.as_str()),
                ("metadata[order_number]", request.order_number.as_str()),
                ("automatic_payment_methods[enabled]", "true"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("payment intent request failed")
                .to_string();
            tracing::warn!(%status, message = %message, "Stripe rejected payment intent");
            return Err(PaymentError::Rejected(message));
        }

        let intent: IntentBody = serde_json::from_value(body)
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::InvalidResponse("missing client_secret".into()))?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
        })
    }
}
