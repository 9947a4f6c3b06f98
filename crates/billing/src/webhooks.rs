//! Payment webhook processing
//!
//! Single ingress point for provider events. Each event runs the same
//! gauntlet: signature verification over the raw bytes, JSON parsing, event
//! type dispatch, idempotency claim, then entitlement grant. Delivery is
//! at-least-once, so the event id is claimed atomically (check and insert
//! under one lock span) before any effect is applied; a redelivered event is
//! acknowledged without reapplying.
//!
//! The signature header is mandatory. An unsigned event is rejected outright
//! rather than processed on trust.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{BillingError, BillingResult};
use crate::ledger::EntitlementLedger;
use crate::signature;

pub const CHECKOUT_COMPLETED: &str = "checkout.completed";

/// Provider event envelope
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventData {
    /// Amount paid, in minor currency units
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

/// Metadata we attached at checkout creation, echoed back by the provider
#[derive(Debug, Default, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub product_sku: Option<String>,
}

/// Terminal state of a processed webhook.
///
/// Both variants are acknowledged with success to the provider; only
/// signature and parse failures surface as errors, so provider-side retries
/// stop for everything we have genuinely received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Event type we have no handler for
    UnhandledEventType,
    /// Event id already processed (idempotent replay)
    Duplicate,
    /// Provider omitted the event id, so the event cannot be deduplicated
    MissingEventId,
    /// Metadata lacks device_id or product_sku
    MissingMetadata,
    /// Metadata names a SKU not in our catalog
    UnknownProduct,
}

impl IgnoreReason {
    fn as_str(self) -> &'static str {
        match self {
            IgnoreReason::UnhandledEventType => "unhandled_event_type",
            IgnoreReason::Duplicate => "duplicate",
            IgnoreReason::MissingEventId => "missing_event_id",
            IgnoreReason::MissingMetadata => "missing_metadata",
            IgnoreReason::UnknownProduct => "unknown_product",
        }
    }
}

/// Authenticates, deduplicates, and applies provider events.
#[derive(Clone)]
pub struct WebhookProcessor {
    webhook_secret: String,
    ledger: EntitlementLedger,
    processed: Arc<RwLock<HashSet<String>>>,
}

impl WebhookProcessor {
    pub fn new(webhook_secret: String, ledger: EntitlementLedger) -> Self {
        Self {
            webhook_secret,
            ledger,
            processed: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Process one incoming event from its raw body and signature header.
    ///
    /// Errors map to caller-facing failures (401 for `SignatureInvalid`, 400
    /// for `MalformedPayload`); every `Ok` outcome is acknowledged as
    /// received.
    pub async fn process(
        &self,
        payload: &[u8],
        provided_signature: Option<&str>,
    ) -> BillingResult<WebhookOutcome> {
        let Some(provided) = provided_signature else {
            tracing::warn!("Webhook rejected: no signature header");
            self.count_event("unknown", "missing_signature");
            return Err(BillingError::SignatureInvalid);
        };

        if !signature::verify(payload, provided, &self.webhook_secret) {
            tracing::warn!(payload_len = payload.len(), "Webhook rejected: invalid signature");
            self.count_event("unknown", "invalid_signature");
            return Err(BillingError::SignatureInvalid);
        }

        let event: WebhookEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                self.count_event("unknown", "malformed");
                return Err(BillingError::MalformedPayload(e.to_string()));
            }
        };

        if event.event_type != CHECKOUT_COMPLETED {
            tracing::info!(
                event_type = %event.event_type,
                event_id = %event.id,
                "Received unhandled event type - no handler configured"
            );
            self.count_event(&event.event_type, "ignored");
            return Ok(WebhookOutcome::Ignored(IgnoreReason::UnhandledEventType));
        }

        if event.id.is_empty() {
            self.count_event(&event.event_type, "missing_event_id");
            return Ok(WebhookOutcome::Ignored(IgnoreReason::MissingEventId));
        }

        // Atomic claim: check-and-insert under one write lock span, so two
        // concurrent deliveries of the same event cannot both proceed.
        {
            let mut processed = self.processed.write().await;
            if !processed.insert(event.id.clone()) {
                tracing::info!(event_id = %event.id, "Duplicate webhook event - already applied");
                self.count_event(&event.event_type, "duplicate");
                return Ok(WebhookOutcome::Ignored(IgnoreReason::Duplicate));
            }
        }

        let outcome = self.apply_checkout_completed(&event).await;
        match outcome {
            WebhookOutcome::Applied => self.count_event(&event.event_type, "success"),
            WebhookOutcome::Ignored(reason) => self.count_event(&event.event_type, reason.as_str()),
        }
        Ok(outcome)
    }

    /// Grant entitlement for a completed checkout.
    ///
    /// Metadata problems are the provider's responsibility, not the end
    /// user's; they are logged and ignored rather than surfaced as errors.
    async fn apply_checkout_completed(&self, event: &WebhookEvent) -> WebhookOutcome {
        let (Some(device_id), Some(product_sku)) = (
            event.data.metadata.device_id.as_deref(),
            event.data.metadata.product_sku.as_deref(),
        ) else {
            tracing::warn!(
                event_id = %event.id,
                "Checkout event missing device_id or product_sku metadata"
            );
            return WebhookOutcome::Ignored(IgnoreReason::MissingMetadata);
        };

        match self.ledger.grant(device_id, product_sku).await {
            Ok(_) => {
                let currency = event
                    .data
                    .currency
                    .clone()
                    .unwrap_or_else(|| "USD".to_string());

                metrics::counter!(
                    "payment_success_total",
                    "tool" => crate::tool_name(),
                    "product_sku" => product_sku.to_string(),
                    "currency" => currency.clone()
                )
                .increment(1);
                metrics::counter!(
                    "payment_revenue_cents_total",
                    "tool" => crate::tool_name(),
                    "product_sku" => product_sku.to_string(),
                    "currency" => currency
                )
                .increment(event.data.amount.max(0) as u64);

                tracing::info!(
                    event_id = %event.id,
                    device_id = %device_id,
                    product_sku = %product_sku,
                    amount_cents = event.data.amount,
                    "Payment applied"
                );
                WebhookOutcome::Applied
            }
            Err(BillingError::UnknownProduct(sku)) => {
                tracing::warn!(
                    event_id = %event.id,
                    product_sku = %sku,
                    "Checkout event references a sku not in the catalog"
                );
                WebhookOutcome::Ignored(IgnoreReason::UnknownProduct)
            }
            Err(e) => {
                // grant only fails on catalog mismatch today; anything else
                // is still acknowledged so the provider stops retrying
                tracing::error!(event_id = %event.id, error = %e, "Entitlement grant failed");
                WebhookOutcome::Ignored(IgnoreReason::UnknownProduct)
            }
        }
    }

    fn count_event(&self, event_type: &str, status: &'static str) {
        metrics::counter!(
            "payment_webhook_received_total",
            "tool" => crate::tool_name(),
            "event_type" => event_type.to_string(),
            "status" => status
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::ProductCatalog;
    use clearcut_shared::ManualClock;
    use time::macros::datetime;

    const SECRET: &str = "whsec_test";

    fn processor() -> (WebhookProcessor, EntitlementLedger) {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 10:00:00 UTC)));
        let catalog = Arc::new(ProductCatalog::builtin());
        let ledger = EntitlementLedger::new_in_memory(catalog, clock);
        (
            WebhookProcessor::new(SECRET.to_string(), ledger.clone()),
            ledger,
        )
    }

    fn checkout_event(event_id: &str, device_id: &str, sku: &str) -> Vec<u8> {
        serde_json::json!({
            "id": event_id,
            "type": CHECKOUT_COMPLETED,
            "data": {
                "amount": 299,
                "currency": "USD",
                "metadata": { "device_id": device_id, "product_sku": sku }
            }
        })
        .to_string()
        .into_bytes()
    }

    fn signed(payload: &[u8]) -> String {
        signature::sign(payload, SECRET).unwrap()
    }

    #[tokio::test]
    async fn completed_checkout_grants_credits() {
        let (processor, ledger) = processor();
        let payload = checkout_event("evt_1", "d2", "starter_50");

        let outcome = processor
            .process(&payload, Some(&signed(&payload)))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);
        assert_eq!(ledger.balance("d2").await.credits, 50);
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let (processor, ledger) = processor();
        let payload = checkout_event("evt_1", "d2", "starter_50");
        let sig = signed(&payload);

        processor.process(&payload, Some(&sig)).await.unwrap();
        let replay = processor.process(&payload, Some(&sig)).await.unwrap();

        assert_eq!(replay, WebhookOutcome::Ignored(IgnoreReason::Duplicate));
        assert_eq!(ledger.balance("d2").await.credits, 50);
    }

    #[tokio::test]
    async fn distinct_events_both_apply() {
        let (processor, ledger) = processor();
        for event_id in ["evt_1", "evt_2"] {
            let payload = checkout_event(event_id, "d2", "starter_50");
            processor
                .process(&payload, Some(&signed(&payload)))
                .await
                .unwrap();
        }
        assert_eq!(ledger.balance("d2").await.credits, 100);
    }

    #[tokio::test]
    async fn missing_signature_rejected() {
        let (processor, ledger) = processor();
        let payload = checkout_event("evt_1", "d2", "starter_50");

        let err = processor.process(&payload, None).await.unwrap_err();
        assert!(matches!(err, BillingError::SignatureInvalid));
        assert_eq!(ledger.balance("d2").await.credits, 0);
    }

    #[tokio::test]
    async fn invalid_signature_rejected() {
        let (processor, ledger) = processor();
        let payload = checkout_event("evt_1", "d2", "starter_50");

        let err = processor
            .process(&payload, Some("sha256=0000"))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::SignatureInvalid));
        assert_eq!(ledger.balance("d2").await.credits, 0);
    }

    #[tokio::test]
    async fn malformed_payload_rejected() {
        let (processor, _) = processor();
        let payload = b"{not json".to_vec();

        let err = processor
            .process(&payload, Some(&signed(&payload)))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn unhandled_event_type_acknowledged() {
        let (processor, _) = processor();
        let payload = serde_json::json!({"id": "evt_9", "type": "refund.created"})
            .to_string()
            .into_bytes();

        let outcome = processor
            .process(&payload, Some(&signed(&payload)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored(IgnoreReason::UnhandledEventType)
        );
    }

    #[tokio::test]
    async fn missing_metadata_acknowledged() {
        let (processor, _) = processor();
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": CHECKOUT_COMPLETED,
            "data": { "amount": 299, "metadata": {} }
        })
        .to_string()
        .into_bytes();

        let outcome = processor
            .process(&payload, Some(&signed(&payload)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored(IgnoreReason::MissingMetadata)
        );
    }

    #[tokio::test]
    async fn unknown_sku_acknowledged_not_granted() {
        let (processor, ledger) = processor();
        let payload = checkout_event("evt_1", "d2", "mega_9000");

        let outcome = processor
            .process(&payload, Some(&signed(&payload)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored(IgnoreReason::UnknownProduct)
        );
        assert_eq!(ledger.balance("d2").await.credits, 0);
    }

    #[tokio::test]
    async fn missing_event_id_cannot_be_deduplicated_so_is_ignored() {
        let (processor, ledger) = processor();
        let payload = serde_json::json!({
            "type": CHECKOUT_COMPLETED,
            "data": { "metadata": { "device_id": "d2", "product_sku": "starter_50" } }
        })
        .to_string()
        .into_bytes();

        let outcome = processor
            .process(&payload, Some(&signed(&payload)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored(IgnoreReason::MissingEventId)
        );
        assert_eq!(ledger.balance("d2").await.credits, 0);
    }
}
