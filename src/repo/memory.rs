use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::course::Course;
use crate::domain::enrollment::Enrollment;
use crate::domain::operator::OperatorActionRecord;
use crate::domain::payment::{NewPayment, Payment, PaymentStatus};
use crate::domain::webhook::WebhookRecord;
use crate::repo::{EnrollOutcome, ReconciliationStore};

#[derive(Default)]
struct Inner {
    courses: HashMap<Uuid, Course>,
    payments: HashMap<Uuid, Payment>,
    webhooks: HashMap<String, WebhookRecord>,
    enrollments: HashMap<(Uuid, Uuid), Enrollment>,
    operator_actions: Vec<OperatorActionRecord>,
    // Remaining ensure_enrollment calls that fail with a simulated storage
    // error. Lets tests exercise the unreconciled-completion path.
    enrollment_failures: u32,
}

/// In-memory store. One lock around all tables makes every compound
/// operation atomic, which is exactly the transactional contract the
/// Postgres implementation provides.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_course(&self, course: Course) {
        self.inner.lock().await.courses.insert(course.course_id, course);
    }

    /// The next `n` enrollment writes fail as if storage were unavailable.
    pub async fn inject_enrollment_failures(&self, n: u32) {
        self.inner.lock().await.enrollment_failures = n;
    }
}

#[async_trait::async_trait]
impl ReconciliationStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        Ok(self.inner.lock().await.courses.get(&course_id).cloned())
    }

    async fn insert_payment(&self, new: &NewPayment) -> Result<Payment> {
        let payment = Payment {
            payment_id: new.payment_id,
            user_id: new.user_id,
            course_id: new.course_id,
            amount_cents: new.amount_cents,
            currency: new.currency.clone(),
            status: PaymentStatus::Pending,
            order_ref: new.order_ref.clone(),
            gateway_txn_ref: None,
            gateway_response: None,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.inner
            .lock()
            .await
            .payments
            .insert(payment.payment_id, payment.clone());
        Ok(payment)
    }

    async fn find_payment(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        Ok(self.inner.lock().await.payments.get(&payment_id).cloned())
    }

    async fn find_payment_by_order_ref(&self, order_ref: &str) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.order_ref == order_ref)
            .cloned())
    }

    async fn find_open_payment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .lock()
            .await
            .payments
            .values()
            .filter(|p| p.user_id == user_id && p.course_id == course_id && !p.status.is_terminal())
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn complete_payment(
        &self,
        payment_id: Uuid,
        gateway_txn_ref: &str,
        gateway_response: &serde_json::Value,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<Payment>> {
        let mut inner = self.inner.lock().await;
        match inner.payments.get_mut(&payment_id) {
            Some(p) if p.status == PaymentStatus::Pending => {
                p.status = PaymentStatus::Completed;
                p.gateway_txn_ref = Some(gateway_txn_ref.to_string());
                p.gateway_response = Some(gateway_response.clone());
                p.completed_at = Some(completed_at);
                Ok(Some(p.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn fail_payment(
        &self,
        payment_id: Uuid,
        reason: &str,
        gateway_response: &serde_json::Value,
    ) -> Result<Option<Payment>> {
        let mut inner = self.inner.lock().await;
        match inner.payments.get_mut(&payment_id) {
            Some(p) if p.status == PaymentStatus::Pending => {
                p.status = PaymentStatus::Failed;
                p.failure_reason = Some(reason.to_string());
                p.gateway_response = Some(gateway_response.clone());
                Ok(Some(p.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn refund_payment(
        &self,
        payment_id: Uuid,
        gateway_response: Option<&serde_json::Value>,
    ) -> Result<Option<Payment>> {
        let mut inner = self.inner.lock().await;
        match inner.payments.get_mut(&payment_id) {
            Some(p) if p.status == PaymentStatus::Completed => {
                p.status = PaymentStatus::Refunded;
                if let Some(raw) = gateway_response {
                    p.gateway_response = Some(raw.clone());
                }
                Ok(Some(p.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn force_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        reason: Option<&str>,
    ) -> Result<Option<Payment>> {
        let mut inner = self.inner.lock().await;
        match inner.payments.get_mut(&payment_id) {
            Some(p) => {
                p.status = status;
                if let Some(r) = reason {
                    p.failure_reason = Some(r.to_string());
                }
                Ok(Some(p.clone()))
            }
            None => Ok(None),
        }
    }

    async fn record_webhook_attempt(
        &self,
        gateway_txn_ref: &str,
        payment_id: Option<Uuid>,
        raw_payload: &serde_json::Value,
    ) -> Result<WebhookRecord> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .webhooks
            .entry(gateway_txn_ref.to_string())
            .or_insert_with(|| WebhookRecord {
                id: Uuid::new_v4(),
                payment_id,
                gateway_txn_ref: gateway_txn_ref.to_string(),
                raw_payload: raw_payload.clone(),
                processing_attempts: 0,
                processed_at: None,
                last_error: None,
                created_at: Utc::now(),
            });
        Ok(record.clone())
    }

    async fn mark_webhook_processed(&self, record_id: Uuid, error: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(record) = inner.webhooks.values_mut().find(|r| r.id == record_id) {
            record.processing_attempts += 1;
            record.processed_at = Some(Utc::now());
            record.last_error = error.map(str::to_string);
        }
        Ok(())
    }

    async fn list_webhooks_for_payment(&self, payment_id: Uuid) -> Result<Vec<WebhookRecord>> {
        let inner = self.inner.lock().await;
        let mut records: Vec<WebhookRecord> = inner
            .webhooks
            .values()
            .filter(|r| r.payment_id == Some(payment_id))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        Ok(self
            .inner
            .lock()
            .await
            .enrollments
            .get(&(user_id, course_id))
            .cloned())
    }

    async fn ensure_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> Result<EnrollOutcome> {
        let mut inner = self.inner.lock().await;
        if inner.enrollment_failures > 0 {
            inner.enrollment_failures -= 1;
            return Err(anyhow!("storage unavailable"));
        }

        if let Some(existing) = inner.enrollments.get(&(user_id, course_id)) {
            return Ok(EnrollOutcome::AlreadyEnrolled(existing.clone()));
        }

        let enrollment = Enrollment {
            enrollment_id: Uuid::new_v4(),
            user_id,
            course_id,
            enrolled_at,
            progress_percent: 0.0,
        };
        inner
            .enrollments
            .insert((user_id, course_id), enrollment.clone());
        Ok(EnrollOutcome::Created(enrollment))
    }

    async fn record_operator_action(&self, action: &OperatorActionRecord) -> Result<()> {
        self.inner.lock().await.operator_actions.push(action.clone());
        Ok(())
    }

    async fn list_operator_actions(&self, payment_id: Uuid) -> Result<Vec<OperatorActionRecord>> {
        Ok(self
            .inner
            .lock()
            .await
            .operator_actions
            .iter()
            .filter(|a| a.payment_id == payment_id)
            .cloned()
            .collect())
    }
}
