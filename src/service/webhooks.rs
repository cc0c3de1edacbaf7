use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::webhook::GatewayNotification;
use crate::lifecycle::{transitions, Transition};
use crate::repo::ReconciliationStore;
use crate::service::reconciler::EnrollmentReconciler;

/// How a (signature-verified) delivery was absorbed. Every variant is
/// acknowledged 200 to the gateway; the distinction exists for the audit
/// trail, logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Completed,
    /// Payment is COMPLETED but the enrollment write failed; the error is on
    /// the webhook record and the completion is retryable.
    CompletedUnreconciled,
    Failed,
    Refunded,
    /// Transaction reference already processed cleanly; attempt counted,
    /// nothing re-ran.
    Duplicate,
    /// Unknown order reference or illegal transition; recorded, not applied.
    Ignored { reason: String },
}

/// Applies verified gateway notifications: audit log first, then the state
/// machine, then enrollment reconciliation.
#[derive(Clone)]
pub struct WebhookProcessor {
    pub store: Arc<dyn ReconciliationStore>,
    pub reconciler: EnrollmentReconciler,
}

impl WebhookProcessor {
    pub async fn process(
        &self,
        notification: GatewayNotification,
        raw_payload: serde_json::Value,
    ) -> Result<WebhookOutcome> {
        // Resolve the owning payment first so the audit record carries it
        // even when the delivery is ultimately ignored.
        let payment = self
            .store
            .find_payment_by_order_ref(&notification.order_ref)
            .await?;

        let record = self
            .store
            .record_webhook_attempt(
                &notification.transaction_ref,
                payment.as_ref().map(|p| p.payment_id),
                &raw_payload,
            )
            .await?;

        if record.is_settled() {
            self.store.mark_webhook_processed(record.id, None).await?;
            tracing::info!(
                txn_ref = %notification.transaction_ref,
                "duplicate delivery short-circuited"
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(payment) = payment else {
            let reason = format!("no payment for order reference {}", notification.order_ref);
            tracing::warn!(txn_ref = %notification.transaction_ref, "{reason}");
            self.store
                .mark_webhook_processed(record.id, Some(&reason))
                .await?;
            return Ok(WebhookOutcome::Ignored { reason });
        };

        match transitions::decide(&payment, &notification) {
            Transition::Complete => {
                let completed = self
                    .store
                    .complete_payment(
                        payment.payment_id,
                        &notification.transaction_ref,
                        &raw_payload,
                        Utc::now(),
                    )
                    .await?;

                match completed {
                    Some(completed) => self.finish_completion(record.id, &completed).await,
                    // Lost the compare-and-set: a concurrent delivery or
                    // operator action got there first.
                    None => self.confirm_terminal(record.id, payment.payment_id).await,
                }
            }
            Transition::ConfirmCompleted => {
                // Redelivery after a clean-processed record was not found
                // settled, i.e. the earlier attempt errored. Re-run only the
                // enrollment step.
                self.finish_completion(record.id, &payment).await
            }
            Transition::Fail { reason } => {
                self.store
                    .fail_payment(payment.payment_id, &reason, &raw_payload)
                    .await?;
                self.store.mark_webhook_processed(record.id, None).await?;
                tracing::info!(payment_id = %payment.payment_id, %reason, "payment failed");
                Ok(WebhookOutcome::Failed)
            }
            Transition::Refund => {
                self.store
                    .refund_payment(payment.payment_id, Some(&raw_payload))
                    .await?;
                self.store.mark_webhook_processed(record.id, None).await?;
                tracing::info!(payment_id = %payment.payment_id, "payment refunded");
                Ok(WebhookOutcome::Refunded)
            }
            Transition::Reject { reason } => {
                let note = format!("illegal transition: {reason}");
                tracing::warn!(payment_id = %payment.payment_id, "{note}");
                self.store
                    .mark_webhook_processed(record.id, Some(&note))
                    .await?;
                Ok(WebhookOutcome::Ignored { reason })
            }
        }
    }

    async fn finish_completion(
        &self,
        record_id: uuid::Uuid,
        payment: &Payment,
    ) -> Result<WebhookOutcome> {
        match self.reconciler.reconcile(payment).await {
            Ok(_) => {
                self.store.mark_webhook_processed(record_id, None).await?;
                Ok(WebhookOutcome::Completed)
            }
            Err(e) => {
                // Payment stays COMPLETED; the failure is durable on the
                // record so a redelivery or operator retry can finish the job.
                let note = format!("enrollment failed: {e}");
                tracing::error!(payment_id = %payment.payment_id, "{note}");
                self.store
                    .mark_webhook_processed(record_id, Some(&note))
                    .await?;
                Ok(WebhookOutcome::CompletedUnreconciled)
            }
        }
    }

    async fn confirm_terminal(
        &self,
        record_id: uuid::Uuid,
        payment_id: uuid::Uuid,
    ) -> Result<WebhookOutcome> {
        let current = self.store.find_payment(payment_id).await?;
        match current {
            Some(p) if p.status == PaymentStatus::Completed => {
                self.finish_completion(record_id, &p).await
            }
            _ => {
                let reason = "payment no longer pending".to_string();
                self.store
                    .mark_webhook_processed(record_id, Some(&reason))
                    .await?;
                Ok(WebhookOutcome::Ignored { reason })
            }
        }
    }
}
