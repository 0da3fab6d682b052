//! Signed webhook envelopes sent by the payment provider.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("invalid signature header")]
    MalformedSignature,

    #[error("invalid signature")]
    SignatureMismatch,

    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntentObject {
    /// Payment intent id, the reference token stored on the order.
    pub id: String,
    #[serde(default)]
    pub metadata: IntentMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IntentMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Succeeded(PaymentIntentObject),
    Failed(PaymentIntentObject),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: Option<String>,
    pub event: PaymentEvent,
}

/// Verify the signature header, then decode the event.
pub fn construct_event(
    payload: &[u8],
    sig_header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
) -> Result<WebhookEvent, WebhookError> {
    let sig_header = sig_header.ok_or(WebhookError::MissingSignature)?;
    verify_signature(
        payload,
        sig_header,
        secret,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    )?;
    parse_event(payload)
}

/// Checks a `t=<unix>,v1=<hex>` header: HMAC-SHA256 of `"{t}.{payload}"`.
/// Any one matching `v1` entry is accepted so secrets can be rolled.
pub fn verify_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedSignature);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::MalformedSignature)?;
    let age = now.checked_sub(ts).and_then(i64::checked_abs);
    if age.is_none_or(|age| age > tolerance_secs) {
        return Err(WebhookError::StaleTimestamp);
    }

    Ok(())
}

pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let envelope: Envelope = serde_json::from_slice(payload)?;
    let event = match envelope.event_type.as_str() {
        PAYMENT_SUCCEEDED => PaymentEvent::Succeeded(serde_json::from_value(envelope.data.object)?),
        PAYMENT_FAILED => PaymentEvent::Failed(serde_json::from_value(envelope.data.object)?),
        _ => PaymentEvent::Other(envelope.event_type),
    };
    Ok(WebhookEvent {
        id: envelope.id,
        event,
    })
}

/// Builds a header value in the provider's format; used by local tooling and tests.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    fn succeeded_payload() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_123", "metadata": { "order_id": "abc" } } }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = succeeded_payload();
        let header = signature_header(&payload, SECRET, NOW);
        assert!(verify_signature(&payload, &header, SECRET, 300, NOW + 10).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let payload = succeeded_payload();
        let header = signature_header(&payload, SECRET, NOW);
        let mut tampered = payload.clone();
        tampered.push(b' ');
        assert!(matches!(
            verify_signature(&tampered, &header, SECRET, 300, NOW),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = succeeded_payload();
        let header = signature_header(&payload, "whsec_other", NOW);
        assert!(matches!(
            verify_signature(&payload, &header, SECRET, 300, NOW),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = succeeded_payload();
        let header = signature_header(&payload, SECRET, NOW - 301);
        assert!(matches!(
            verify_signature(&payload, &header, SECRET, 300, NOW),
            Err(WebhookError::StaleTimestamp)
        ));
    }

    #[test]
    fn rejects_extreme_timestamps() {
        let payload = succeeded_payload();
        for ts in [i64::MIN, i64::MAX] {
            let header = signature_header(&payload, SECRET, ts);
            assert!(matches!(
                verify_signature(&payload, &header, SECRET, 300, NOW),
                Err(WebhookError::StaleTimestamp)
            ));
        }
    }

    #[test]
    fn rejects_malformed_header() {
        let payload = succeeded_payload();
        for header in ["", "t=123", "v1=abcd", "garbage"] {
            assert!(matches!(
                verify_signature(&payload, header, SECRET, 300, NOW),
                Err(WebhookError::MalformedSignature)
            ));
        }
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = succeeded_payload();
        let header = signature_header(&payload, SECRET, NOW);
        let rolled = format!("{header},v1=deadbeef");
        let rolled_first = header.replacen("v1=", "v1=00ff,v1=", 1);
        assert!(verify_signature(&payload, &rolled, SECRET, 300, NOW).is_ok());
        assert!(verify_signature(&payload, &rolled_first, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn missing_header_is_rejected_before_parsing() {
        assert!(matches!(
            construct_event(b"not json", None, SECRET, 300),
            Err(WebhookError::MissingSignature)
        ));
    }

    #[test]
    fn parses_known_and_unknown_events() {
        let event = parse_event(&succeeded_payload()).unwrap();
        assert_eq!(event.id.as_deref(), Some("evt_1"));
        match event.event {
            PaymentEvent::Succeeded(intent) => {
                assert_eq!(intent.id, "pi_123");
                assert_eq!(intent.metadata.order_id.as_deref(), Some("abc"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let other = serde_json::json!({
            "type": "charge.refunded",
            "data": { "object": { "amount": 10 } }
        })
        .to_string();
        assert_eq!(
            parse_event(other.as_bytes()).unwrap().event,
            PaymentEvent::Other("charge.refunded".into())
        );
    }

    #[test]
    fn known_event_without_intent_id_is_invalid() {
        let payload = serde_json::json!({
            "type": "payment_intent.payment_failed",
            "data": { "object": { "metadata": {} } }
        })
        .to_string();
        assert!(matches!(
            parse_event(payload.as_bytes()),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
