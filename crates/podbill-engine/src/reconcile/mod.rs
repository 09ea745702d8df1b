//! Payment reconciler
//!
//! Consumes at-least-once-delivered gateway webhooks, verifies their
//! signatures, and credits the wallet at most once per external payment
//! reference. Verification fails closed: a missing secret or a signature
//! mismatch rejects the event before any payload field is trusted.
//!
//! Idempotency: the payment log is unique on (provider, reference); the
//! existence check and the credit + insert run as one unit under the log
//! entry's lock, so gateway retries cannot double-credit.

pub mod providers;

use crate::ledger::WalletLedger;
use dashmap::DashMap;
use podbill_common::{
    AccountId, PaymentRecord, PodBillError, Result, MINOR_UNITS_PER_UNIT,
};
use providers::PaymentNotice;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Webhook secrets, one per gateway
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    secrets: HashMap<String, String>,
}

impl ReconcilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the webhook secret for a provider
    pub fn with_secret(mut self, provider: &str, secret: impl Into<String>) -> Self {
        self.secrets.insert(provider.to_string(), secret.into());
        self
    }

    fn secret_for(&self, provider: &str) -> Result<&str> {
        self.secrets
            .get(provider)
            .map(String::as_str)
            .ok_or_else(|| {
                PodBillError::SignatureInvalid(format!("no webhook secret configured for {provider}"))
            })
    }
}

/// Caller-visible result of a webhook delivery; replays and non-payment
/// events are acknowledged, not errors
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// First sight of the payment: wallet credited
    Credited { account: AccountId, amount: Decimal },
    /// Reference already processed, no further action
    AlreadyProcessed,
    /// Authentic event of a type that does not credit
    Ignored,
}

/// Idempotent gateway-webhook crediting into the wallet ledger
pub struct PaymentReconciler {
    ledger: Arc<WalletLedger>,
    config: ReconcilerConfig,
    /// Processed payments, unique on (provider, reference)
    payments: DashMap<(String, String), PaymentRecord>,
}

impl PaymentReconciler {
    pub fn new(ledger: Arc<WalletLedger>, config: ReconcilerConfig) -> Self {
        Self {
            ledger,
            config,
            payments: DashMap::new(),
        }
    }

    /// Verify, parse, and settle one webhook delivery.
    #[instrument(skip(self, raw_body, signature))]
    pub async fn handle_webhook(
        &self,
        provider: &str,
        raw_body: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome> {
        let secret = self.config.secret_for(provider)?;

        let notice = match provider {
            providers::RAZORPAY => providers::razorpay::verify_and_parse(secret, raw_body, signature)?,
            providers::STRIPE => providers::stripe::verify_and_parse(secret, raw_body, signature)?,
            other => {
                return Err(PodBillError::Validation(format!(
                    "unknown payment provider: {other}"
                )))
            }
        };

        let Some(notice) = notice else {
            return Ok(WebhookOutcome::Ignored);
        };

        self.settle(provider, notice)
    }

    /// Credit once per reference; the entry lock makes the existence check
    /// and the credit + insert one logical unit.
    fn settle(&self, provider: &str, notice: PaymentNotice) -> Result<WebhookOutcome> {
        let amount = Decimal::from(notice.amount_minor) / Decimal::from(MINOR_UNITS_PER_UNIT);
        let key = (provider.to_string(), notice.reference.clone());

        match self.payments.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                info!(provider, reference = %notice.reference, "Duplicate webhook, already processed");
                Ok(WebhookOutcome::AlreadyProcessed)
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let reason = format!("{} payment ({})", provider, notice.reference);
                if let Err(e) = self.ledger.credit(notice.account, amount, &reason) {
                    // no record inserted: a later retry may still succeed
                    warn!(provider, reference = %notice.reference, error = %e, "Credit failed");
                    return Err(e);
                }
                vacant.insert(PaymentRecord::new(provider, notice.reference.clone()));
                info!(
                    provider, account = notice.account, %amount,
                    reference = %notice.reference, "Wallet credited from webhook"
                );
                Ok(WebhookOutcome::Credited {
                    account: notice.account,
                    amount,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::{Hmac, Mac};
    use rust_decimal_macros::dec;
    use sha2::Sha256;

    const SECRET: &str = "whsec_test";

    fn reconciler() -> (Arc<WalletLedger>, PaymentReconciler) {
        let ledger = Arc::new(WalletLedger::new());
        ledger.create_account(1);
        let config = ReconcilerConfig::new()
            .with_secret(providers::RAZORPAY, SECRET)
            .with_secret(providers::STRIPE, SECRET);
        let reconciler = PaymentReconciler::new(ledger.clone(), config);
        (ledger, reconciler)
    }

    fn hmac_hex(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn razorpay_body(payment_id: &str, amount_minor: u64, user_id: Option<&str>) -> Vec<u8> {
        let notes = match user_id {
            Some(id) => format!(r#"{{"user_id": "{id}"}}"#),
            None => "{}".to_string(),
        };
        format!(
            r#"{{"event":"payment.captured","payload":{{"payment":{{"entity":{{"id":"{payment_id}","amount":{amount_minor},"notes":{notes}}}}}}}}}"#
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn test_first_delivery_credits_wallet() {
        let (ledger, reconciler) = reconciler();
        let body = razorpay_body("pay_123", 50000, Some("1"));
        let sig = hmac_hex(SECRET, &body);

        let outcome = reconciler
            .handle_webhook(providers::RAZORPAY, &body, &sig)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Credited {
                account: 1,
                amount: dec!(500)
            }
        );
        assert_eq!(ledger.get_balance(1).unwrap(), dec!(500));
    }

    #[tokio::test]
    async fn test_replay_credits_exactly_once() {
        let (ledger, reconciler) = reconciler();
        let body = razorpay_body("pay_123", 50000, Some("1"));
        let sig = hmac_hex(SECRET, &body);

        reconciler
            .handle_webhook(providers::RAZORPAY, &body, &sig)
            .await
            .unwrap();
        let replay = reconciler
            .handle_webhook(providers::RAZORPAY, &body, &sig)
            .await
            .unwrap();

        assert_eq!(replay, WebhookOutcome::AlreadyProcessed);
        assert_eq!(ledger.get_balance(1).unwrap(), dec!(500));
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_signature_never_credits() {
        let (ledger, reconciler) = reconciler();
        let body = razorpay_body("pay_123", 50000, Some("1"));

        let result = reconciler
            .handle_webhook(providers::RAZORPAY, &body, "deadbeef")
            .await;
        assert!(matches!(result, Err(PodBillError::SignatureInvalid(_))));
        assert_eq!(ledger.get_balance(1).unwrap(), dec!(0));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_closed() {
        let ledger = Arc::new(WalletLedger::new());
        let reconciler = PaymentReconciler::new(ledger, ReconcilerConfig::new());
        let body = razorpay_body("pay_123", 50000, Some("1"));
        let sig = hmac_hex(SECRET, &body);

        let result = reconciler
            .handle_webhook(providers::RAZORPAY, &body, &sig)
            .await;
        assert!(matches!(result, Err(PodBillError::SignatureInvalid(_))));
    }

    #[tokio::test]
    async fn test_non_payment_event_is_ignored() {
        let (ledger, reconciler) = reconciler();
        let body = br#"{"event":"payment.failed","payload":{"payment":{"entity":{"id":"pay_9","amount":100,"notes":{"user_id":"1"}}}}}"#;
        let sig = hmac_hex(SECRET, body);

        let outcome = reconciler
            .handle_webhook(providers::RAZORPAY, body, &sig)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(ledger.get_balance(1).unwrap(), dec!(0));
    }

    #[tokio::test]
    async fn test_missing_account_metadata_rejected() {
        let (ledger, reconciler) = reconciler();
        let body = razorpay_body("pay_123", 50000, None);
        let sig = hmac_hex(SECRET, &body);

        let result = reconciler
            .handle_webhook(providers::RAZORPAY, &body, &sig)
            .await;
        assert!(matches!(result, Err(PodBillError::Validation(_))));
        assert_eq!(ledger.get_balance(1).unwrap(), dec!(0));
    }

    #[tokio::test]
    async fn test_unknown_account_leaves_no_record() {
        let (_ledger, reconciler) = reconciler();
        let body = razorpay_body("pay_777", 1000, Some("999"));
        let sig = hmac_hex(SECRET, &body);

        let result = reconciler
            .handle_webhook(providers::RAZORPAY, &body, &sig)
            .await;
        assert!(result.is_err());

        // no payment record was written, so a retry after the account
        // exists can still settle
        assert!(reconciler
            .payments
            .get(&(providers::RAZORPAY.to_string(), "pay_777".to_string()))
            .is_none());
    }

    #[tokio::test]
    async fn test_stripe_checkout_completed_credits() {
        let (ledger, reconciler) = reconciler();
        let body = br#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_42","amount_total":2500,"metadata":{"user_id":"1"}}}}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(body));
        let sig = format!(
            "t={},v1={}",
            timestamp,
            hmac_hex(SECRET, signed_payload.as_bytes())
        );

        let outcome = reconciler
            .handle_webhook(providers::STRIPE, body, &sig)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Credited {
                account: 1,
                amount: dec!(25)
            }
        );
        assert_eq!(ledger.get_balance(1).unwrap(), dec!(25));
    }
}
