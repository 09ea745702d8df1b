//! Gateway-specific webhook verification and parsing
//!
//! Each provider verifies the raw body against its signature scheme before
//! any field is read, then extracts a [`PaymentNotice`] from its success
//! event. All comparisons are constant-time via `Mac::verify_slice`.

use hmac::{Hmac, Mac};
use podbill_common::{AccountId, PodBillError, Result};
use serde_json::Value;
use sha2::Sha256;

/// Razorpay provider name
pub const RAZORPAY: &str = "razorpay";

/// Stripe provider name
pub const STRIPE: &str = "stripe";

type HmacSha256 = Hmac<Sha256>;

/// Verified successful payment extracted from a webhook body
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotice {
    /// Provider-assigned unique reference
    pub reference: String,
    /// Amount in minor currency units
    pub amount_minor: u64,
    /// Credited account, from provider-side metadata
    pub account: AccountId,
}

/// Constant-time HMAC-SHA256 check of `message` against a hex signature
fn verify_hmac_hex(secret: &str, message: &[u8], signature_hex: &str) -> Result<()> {
    let signature = hex::decode(signature_hex)
        .map_err(|_| PodBillError::SignatureInvalid("signature is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PodBillError::SignatureInvalid("invalid webhook secret".into()))?;
    mac.update(message);
    mac.verify_slice(&signature)
        .map_err(|_| PodBillError::SignatureInvalid("signature mismatch".into()))
}

fn parse_body(raw_body: &[u8]) -> Result<Value> {
    serde_json::from_slice(raw_body)
        .map_err(|e| PodBillError::Validation(format!("malformed webhook body: {e}")))
}

/// Account id from gateway metadata; accepts string or numeric encodings
fn account_from_metadata(metadata: &Value) -> Result<AccountId> {
    let user_id = &metadata["user_id"];
    user_id
        .as_u64()
        .or_else(|| user_id.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| PodBillError::Validation("user_id missing from payment metadata".into()))
}

pub mod razorpay {
    //! Razorpay: HMAC-SHA256 hex of the raw body, success event
    //! `payment.captured`, account id in `notes.user_id`.

    use super::*;

    pub fn verify_and_parse(
        secret: &str,
        raw_body: &[u8],
        signature: &str,
    ) -> Result<Option<PaymentNotice>> {
        verify_hmac_hex(secret, raw_body, signature)?;

        let payload = parse_body(raw_body)?;
        if payload["event"].as_str() != Some("payment.captured") {
            return Ok(None);
        }

        let entity = &payload["payload"]["payment"]["entity"];
        let reference = entity["id"]
            .as_str()
            .ok_or_else(|| PodBillError::Validation("payment id missing".into()))?
            .to_string();
        let amount_minor = entity["amount"]
            .as_u64()
            .ok_or_else(|| PodBillError::Validation("payment amount missing".into()))?;
        let account = account_from_metadata(&entity["notes"])?;

        Ok(Some(PaymentNotice {
            reference,
            amount_minor,
            account,
        }))
    }
}

pub mod stripe {
    //! Stripe: `Stripe-Signature` header of the form `t=<ts>,v1=<sig>`,
    //! HMAC-SHA256 over `"{t}.{body}"`, success event
    //! `checkout.session.completed`, account id in `metadata.user_id`.

    use super::*;

    pub fn verify_and_parse(
        secret: &str,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<Option<PaymentNotice>> {
        let (timestamp, signature) = split_header(signature_header)?;

        let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + raw_body.len());
        signed_payload.extend_from_slice(timestamp.as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(raw_body);
        verify_hmac_hex(secret, &signed_payload, signature)?;

        let event = parse_body(raw_body)?;
        if event["type"].as_str() != Some("checkout.session.completed") {
            return Ok(None);
        }

        let object = &event["data"]["object"];
        let reference = object["id"]
            .as_str()
            .ok_or_else(|| PodBillError::Validation("checkout session id missing".into()))?
            .to_string();
        let amount_minor = object["amount_total"]
            .as_u64()
            .ok_or_else(|| PodBillError::Validation("amount_total missing".into()))?;
        let account = account_from_metadata(&object["metadata"])?;

        Ok(Some(PaymentNotice {
            reference,
            amount_minor,
            account,
        }))
    }

    fn split_header(header: &str) -> Result<(&str, &str)> {
        let mut timestamp = None;
        let mut signature = None;
        for part in header.split(',') {
            match part.split_once('=') {
                Some(("t", t)) => timestamp = Some(t),
                Some(("v1", v1)) => signature = Some(v1),
                _ => {}
            }
        }
        match (timestamp, signature) {
            (Some(t), Some(v1)) => Ok((t, v1)),
            _ => Err(PodBillError::SignatureInvalid(
                "malformed Stripe-Signature header".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_hmac_verify_round_trip() {
        let sig = sign("secret", b"body");
        assert!(verify_hmac_hex("secret", b"body", &sig).is_ok());
        assert!(verify_hmac_hex("secret", b"tampered", &sig).is_err());
        assert!(verify_hmac_hex("other", b"body", &sig).is_err());
        assert!(verify_hmac_hex("secret", b"body", "not-hex").is_err());
    }

    #[test]
    fn test_account_metadata_encodings() {
        assert_eq!(
            account_from_metadata(&serde_json::json!({"user_id": 7})).unwrap(),
            7
        );
        assert_eq!(
            account_from_metadata(&serde_json::json!({"user_id": "7"})).unwrap(),
            7
        );
        assert!(account_from_metadata(&serde_json::json!({})).is_err());
        assert!(account_from_metadata(&serde_json::json!({"user_id": "abc"})).is_err());
    }

    #[test]
    fn test_stripe_header_split() {
        let body = br#"{"type":"other"}"#;
        let signed = format!("123.{}", String::from_utf8_lossy(body));
        let header = format!("t=123,v1={}", sign("s", signed.as_bytes()));

        let outcome = stripe::verify_and_parse("s", body, &header).unwrap();
        assert!(outcome.is_none()); // authentic but not a success event

        assert!(stripe::verify_and_parse("s", body, "v1=abc").is_err());
        assert!(stripe::verify_and_parse("s", body, "garbage").is_err());
    }
}
