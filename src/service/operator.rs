use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::enrollment::EnrollmentSummary;
use crate::domain::operator::OperatorActionRecord;
use crate::domain::payment::{internal, ErrorEnvelope, Payment, PaymentStatus, ServiceError};
use crate::domain::webhook::WebhookRecord;
use crate::repo::ReconciliationStore;
use crate::service::reconciler::EnrollmentReconciler;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAction {
    UpdateStatus,
    RetryEnrollment,
    ManualComplete,
}

impl OperatorAction {
    fn as_str(&self) -> &'static str {
        match self {
            OperatorAction::UpdateStatus => "update_status",
            OperatorAction::RetryEnrollment => "retry_enrollment",
            OperatorAction::ManualComplete => "manual_complete",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminPaymentRequest {
    pub action: OperatorAction,
    pub status: Option<PaymentStatus>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminPaymentResponse {
    pub payment: Payment,
    pub enrollment: Option<EnrollmentSummary>,
}

#[derive(Debug, Serialize)]
pub struct PaymentInspection {
    pub payment: Payment,
    pub webhooks: Vec<WebhookRecord>,
    pub operator_actions: Vec<OperatorActionRecord>,
}

/// Manual override surface for when automatic reconciliation stalls. Every
/// action lands in the operator audit trail with who/when/what.
#[derive(Clone)]
pub struct OperatorService {
    pub store: Arc<dyn ReconciliationStore>,
    pub reconciler: EnrollmentReconciler,
}

impl OperatorService {
    pub async fn handle(
        &self,
        payment_id: Uuid,
        request: AdminPaymentRequest,
        actor: &str,
    ) -> Result<AdminPaymentResponse, ServiceError> {
        let payment = self
            .store
            .find_payment(payment_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    ErrorEnvelope::new("PAYMENT_NOT_FOUND", "payment does not exist"),
                )
            })?;

        let response = match request.action {
            OperatorAction::UpdateStatus => {
                self.update_status(&payment, request.status, request.reason.as_deref())
                    .await?
            }
            OperatorAction::RetryEnrollment => self.retry_enrollment(&payment).await?,
            OperatorAction::ManualComplete => {
                self.manual_complete(&payment, request.reason.as_deref()).await?
            }
        };

        self.store
            .record_operator_action(&OperatorActionRecord {
                id: Uuid::new_v4(),
                payment_id,
                actor: actor.to_string(),
                action: request.action.as_str().to_string(),
                reason: request.reason,
                created_at: Utc::now(),
            })
            .await
            .map_err(internal)?;

        tracing::info!(
            payment_id = %payment_id,
            actor,
            action = request.action.as_str(),
            "operator action applied"
        );
        Ok(response)
    }

    pub async fn inspect(&self, payment_id: Uuid) -> Result<PaymentInspection, ServiceError> {
        let payment = self
            .store
            .find_payment(payment_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    ErrorEnvelope::new("PAYMENT_NOT_FOUND", "payment does not exist"),
                )
            })?;

        let webhooks = self
            .store
            .list_webhooks_for_payment(payment_id)
            .await
            .map_err(internal)?;
        let operator_actions = self
            .store
            .list_operator_actions(payment_id)
            .await
            .map_err(internal)?;

        Ok(PaymentInspection {
            payment,
            webhooks,
            operator_actions,
        })
    }

    async fn update_status(
        &self,
        payment: &Payment,
        status: Option<PaymentStatus>,
        reason: Option<&str>,
    ) -> Result<AdminPaymentResponse, ServiceError> {
        let status = status.ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new("INVALID_ACTION", "update_status requires a status"),
            )
        })?;

        // COMPLETED carries invariants (txn ref, enrollment) that a bare
        // status write cannot satisfy; manual_complete is the path for that.
        if status == PaymentStatus::Completed {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new(
                    "INVALID_ACTION",
                    "use manual_complete to force completion",
                ),
            ));
        }
        if status == PaymentStatus::Pending {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new("INVALID_ACTION", "cannot move a payment back to PENDING"),
            ));
        }

        // Forced writes still follow the one-directional transition table:
        // only PENDING can fail, only COMPLETED can refund, and REFUNDED is
        // final even for operators.
        let legal = matches!(
            (payment.status, status),
            (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Completed, PaymentStatus::Refunded)
        );
        if !legal {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new(
                    "INVALID_ACTION",
                    &format!(
                        "cannot move a {} payment to {}",
                        payment.status.as_str(),
                        status.as_str()
                    ),
                ),
            ));
        }

        let updated = self
            .store
            .force_status(payment.payment_id, status, reason)
            .await
            .map_err(internal)?
            .ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    ErrorEnvelope::new("PAYMENT_NOT_FOUND", "payment does not exist"),
                )
            })?;

        Ok(AdminPaymentResponse {
            payment: updated,
            enrollment: None,
        })
    }

    async fn retry_enrollment(&self, payment: &Payment) -> Result<AdminPaymentResponse, ServiceError> {
        if payment.status != PaymentStatus::Completed {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new(
                    "INVALID_ACTION",
                    "retry_enrollment requires a COMPLETED payment",
                ),
            ));
        }

        let outcome = self
            .reconciler
            .retry_failed_enrollment(payment.payment_id)
            .await
            .map_err(internal)?;

        Ok(AdminPaymentResponse {
            payment: payment.clone(),
            enrollment: Some(outcome.enrollment().summary()),
        })
    }

    async fn manual_complete(
        &self,
        payment: &Payment,
        reason: Option<&str>,
    ) -> Result<AdminPaymentResponse, ServiceError> {
        let payment = match payment.status {
            PaymentStatus::Pending => {
                let txn_ref = format!("manual_{}", Uuid::new_v4().simple());
                let snapshot = json!({"source": "operator", "reason": reason});
                match self
                    .store
                    .complete_payment(payment.payment_id, &txn_ref, &snapshot, Utc::now())
                    .await
                    .map_err(internal)?
                {
                    Some(p) => p,
                    // Raced with a webhook completion; take the current row.
                    None => self
                        .store
                        .find_payment(payment.payment_id)
                        .await
                        .map_err(internal)?
                        .ok_or_else(|| {
                            (
                                StatusCode::NOT_FOUND,
                                ErrorEnvelope::new("PAYMENT_NOT_FOUND", "payment does not exist"),
                            )
                        })?,
                }
            }
            // Idempotent against a completion that already happened.
            PaymentStatus::Completed => payment.clone(),
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    ErrorEnvelope::new(
                        "INVALID_ACTION",
                        "manual_complete requires a PENDING or COMPLETED payment",
                    ),
                ))
            }
        };

        if payment.status != PaymentStatus::Completed {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new("INVALID_ACTION", "payment reached a non-completable state"),
            ));
        }

        let outcome = self
            .reconciler
            .reconcile(&payment)
            .await
            .map_err(internal)?;

        Ok(AdminPaymentResponse {
            payment,
            enrollment: Some(outcome.enrollment().summary()),
        })
    }
}
