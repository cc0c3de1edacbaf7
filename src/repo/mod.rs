use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::course::Course;
use crate::domain::enrollment::Enrollment;
use crate::domain::operator::OperatorActionRecord;
use crate::domain::payment::{NewPayment, Payment, PaymentStatus};
use crate::domain::webhook::WebhookRecord;

pub mod memory;
pub mod postgres;

#[derive(Debug, Clone)]
pub enum EnrollOutcome {
    Created(Enrollment),
    AlreadyEnrolled(Enrollment),
}

impl EnrollOutcome {
    pub fn enrollment(&self) -> &Enrollment {
        match self {
            EnrollOutcome::Created(e) | EnrollOutcome::AlreadyEnrolled(e) => e,
        }
    }
}

/// Storage interface injected into every service. Compound operations are
/// atomic in the implementation: guarded status updates are compare-and-set
/// on the payment row, and `ensure_enrollment` is a single transaction.
#[async_trait::async_trait]
pub trait ReconciliationStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    // Courses are owned by the catalog subsystem; read-only here.
    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>>;

    async fn insert_payment(&self, new: &NewPayment) -> Result<Payment>;
    async fn find_payment(&self, payment_id: Uuid) -> Result<Option<Payment>>;
    async fn find_payment_by_order_ref(&self, order_ref: &str) -> Result<Option<Payment>>;
    /// Most recent non-terminal payment for (user, course), if any. Guards
    /// against double initiation.
    async fn find_open_payment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Payment>>;

    /// PENDING -> COMPLETED, compare-and-set. Returns None when the payment
    /// was no longer PENDING, so a racing completer can observe it lost.
    async fn complete_payment(
        &self,
        payment_id: Uuid,
        gateway_txn_ref: &str,
        gateway_response: &serde_json::Value,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<Payment>>;

    /// PENDING -> FAILED, compare-and-set.
    async fn fail_payment(
        &self,
        payment_id: Uuid,
        reason: &str,
        gateway_response: &serde_json::Value,
    ) -> Result<Option<Payment>>;

    /// COMPLETED -> REFUNDED, compare-and-set.
    async fn refund_payment(
        &self,
        payment_id: Uuid,
        gateway_response: Option<&serde_json::Value>,
    ) -> Result<Option<Payment>>;

    /// Operator override. No status guard; legality is the caller's problem.
    async fn force_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        reason: Option<&str>,
    ) -> Result<Option<Payment>>;

    /// Get-or-create the audit record for a gateway transaction reference.
    /// Returns the existing record untouched when the reference was seen
    /// before.
    async fn record_webhook_attempt(
        &self,
        gateway_txn_ref: &str,
        payment_id: Option<Uuid>,
        raw_payload: &serde_json::Value,
    ) -> Result<WebhookRecord>;

    /// Increments the attempt counter and stamps processed_at / last_error.
    async fn mark_webhook_processed(&self, record_id: Uuid, error: Option<&str>) -> Result<()>;

    async fn list_webhooks_for_payment(&self, payment_id: Uuid) -> Result<Vec<WebhookRecord>>;

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>>;

    /// Atomic check-then-insert for (user_id, course_id). Exactly one row can
    /// ever be created, no matter how many concurrent callers race here.
    async fn ensure_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> Result<EnrollOutcome>;

    async fn record_operator_action(&self, action: &OperatorActionRecord) -> Result<()>;
    async fn list_operator_actions(&self, payment_id: Uuid) -> Result<Vec<OperatorActionRecord>>;
}
