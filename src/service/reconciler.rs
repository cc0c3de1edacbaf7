use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::domain::payment::Payment;
use crate::repo::{EnrollOutcome, ReconciliationStore};

/// Brings the enrollment table into agreement with a completed payment.
/// Both entry points are idempotent: an existing enrollment is success.
#[derive(Clone)]
pub struct EnrollmentReconciler {
    pub store: Arc<dyn ReconciliationStore>,
}

impl EnrollmentReconciler {
    pub async fn reconcile(&self, payment: &Payment) -> Result<EnrollOutcome> {
        let outcome = self
            .store
            .ensure_enrollment(payment.user_id, payment.course_id, Utc::now())
            .await?;

        if let EnrollOutcome::Created(enrollment) = &outcome {
            tracing::info!(
                payment_id = %payment.payment_id,
                enrollment_id = %enrollment.enrollment_id,
                "enrollment created"
            );
        }
        Ok(outcome)
    }

    /// Re-runs only the enrollment-creation step for a payment that is
    /// already COMPLETED but unreconciled. Deliberately does not re-verify
    /// payment status; the operator surface gates on it instead.
    pub async fn retry_failed_enrollment(&self, payment_id: Uuid) -> Result<EnrollOutcome> {
        let payment = self
            .store
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| anyhow!("payment {payment_id} not found"))?;

        self.reconcile(&payment).await
    }
}
