use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::course::Course;
use crate::domain::enrollment::Enrollment;
use crate::domain::operator::OperatorActionRecord;
use crate::domain::payment::{NewPayment, Payment, PaymentStatus};
use crate::domain::webhook::WebhookRecord;
use crate::repo::{EnrollOutcome, ReconciliationStore};

#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

const PAYMENT_COLUMNS: &str = "payment_id, user_id, course_id, amount_cents, currency, status, \
     order_ref, gateway_txn_ref, gateway_response, failure_reason, created_at, completed_at";

fn payment_from_row(row: &sqlx::postgres::PgRow) -> Payment {
    let status: String = row.get("status");
    Payment {
        payment_id: row.get("payment_id"),
        user_id: row.get("user_id"),
        course_id: row.get("course_id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        status: PaymentStatus::parse(&status).unwrap_or(PaymentStatus::Pending),
        order_ref: row.get("order_ref"),
        gateway_txn_ref: row.get("gateway_txn_ref"),
        gateway_response: row.get("gateway_response"),
        failure_reason: row.get("failure_reason"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    }
}

fn webhook_from_row(row: &sqlx::postgres::PgRow) -> WebhookRecord {
    WebhookRecord {
        id: row.get("id"),
        payment_id: row.get("payment_id"),
        gateway_txn_ref: row.get("gateway_txn_ref"),
        raw_payload: row.get("raw_payload"),
        processing_attempts: row.get("processing_attempts"),
        processed_at: row.get("processed_at"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
    }
}

fn enrollment_from_row(row: &sqlx::postgres::PgRow) -> Enrollment {
    Enrollment {
        enrollment_id: row.get("enrollment_id"),
        user_id: row.get("user_id"),
        course_id: row.get("course_id"),
        enrolled_at: row.get("enrolled_at"),
        progress_percent: row.get("progress_percent"),
    }
}

#[async_trait::async_trait]
impl ReconciliationStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        let row = sqlx::query(
            "SELECT course_id, title, price_cents, currency, is_published FROM courses WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Course {
            course_id: r.get("course_id"),
            title: r.get("title"),
            price_cents: r.get("price_cents"),
            currency: r.get("currency"),
            is_published: r.get("is_published"),
        }))
    }

    async fn insert_payment(&self, new: &NewPayment) -> Result<Payment> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (payment_id, user_id, course_id, amount_cents, currency, status, order_ref)
            VALUES ($1, $2, $3, $4, $5, 'PENDING', $6)
            RETURNING {PAYMENT_COLUMNS}
            "#,
        ))
        .bind(new.payment_id)
        .bind(new.user_id)
        .bind(new.course_id)
        .bind(new.amount_cents)
        .bind(&new.currency)
        .bind(&new.order_ref)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment_from_row(&row))
    }

    async fn find_payment(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(payment_from_row))
    }

    async fn find_payment_by_order_ref(&self, order_ref: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_ref = $1"
        ))
        .bind(order_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(payment_from_row))
    }

    async fn find_open_payment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE user_id = $1 AND course_id = $2 AND status = 'PENDING'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(payment_from_row))
    }

    async fn complete_payment(
        &self,
        payment_id: Uuid,
        gateway_txn_ref: &str,
        gateway_response: &serde_json::Value,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = 'COMPLETED', gateway_txn_ref = $2, gateway_response = $3, completed_at = $4
            WHERE payment_id = $1 AND status = 'PENDING'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(gateway_txn_ref)
        .bind(gateway_response.clone())
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(payment_from_row))
    }

    async fn fail_payment(
        &self,
        payment_id: Uuid,
        reason: &str,
        gateway_response: &serde_json::Value,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = 'FAILED', failure_reason = $2, gateway_response = $3
            WHERE payment_id = $1 AND status = 'PENDING'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(reason)
        .bind(gateway_response.clone())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(payment_from_row))
    }

    async fn refund_payment(
        &self,
        payment_id: Uuid,
        gateway_response: Option<&serde_json::Value>,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = 'REFUNDED', gateway_response = COALESCE($2, gateway_response)
            WHERE payment_id = $1 AND status = 'COMPLETED'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(gateway_response.cloned())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(payment_from_row))
    }

    async fn force_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        reason: Option<&str>,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = $2, failure_reason = COALESCE($3, failure_reason)
            WHERE payment_id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(status.as_str())
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(payment_from_row))
    }

    async fn record_webhook_attempt(
        &self,
        gateway_txn_ref: &str,
        payment_id: Option<Uuid>,
        raw_payload: &serde_json::Value,
    ) -> Result<WebhookRecord> {
        sqlx::query(
            r#"
            INSERT INTO webhook_records (id, payment_id, gateway_txn_ref, raw_payload, processing_attempts)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (gateway_txn_ref) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(gateway_txn_ref)
        .bind(raw_payload.clone())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT id, payment_id, gateway_txn_ref, raw_payload, processing_attempts,
                   processed_at, last_error, created_at
            FROM webhook_records
            WHERE gateway_txn_ref = $1
            "#,
        )
        .bind(gateway_txn_ref)
        .fetch_one(&self.pool)
        .await?;

        Ok(webhook_from_row(&row))
    }

    async fn mark_webhook_processed(&self, record_id: Uuid, error: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_records
            SET processing_attempts = processing_attempts + 1, processed_at = $2, last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(record_id)
        .bind(Utc::now())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_webhooks_for_payment(&self, payment_id: Uuid) -> Result<Vec<WebhookRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, payment_id, gateway_txn_ref, raw_payload, processing_attempts,
                   processed_at, last_error, created_at
            FROM webhook_records
            WHERE payment_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(webhook_from_row).collect())
    }

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let row = sqlx::query(
            r#"
            SELECT enrollment_id, user_id, course_id, enrolled_at, progress_percent
            FROM enrollments
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(enrollment_from_row))
    }

    async fn ensure_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> Result<EnrollOutcome> {
        // Explicit read-branch-write inside one transaction; the unique
        // (user_id, course_id) index is the backstop for racing inserts.
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            r#"
            SELECT enrollment_id, user_id, course_id, enrolled_at, progress_percent
            FROM enrollments
            WHERE user_id = $1 AND course_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(tx.as_mut())
        .await?;

        if let Some(row) = existing {
            tx.commit().await?;
            return Ok(EnrollOutcome::AlreadyEnrolled(enrollment_from_row(&row)));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (enrollment_id, user_id, course_id, enrolled_at, progress_percent)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING enrollment_id, user_id, course_id, enrolled_at, progress_percent
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .bind(enrolled_at)
        .fetch_optional(tx.as_mut())
        .await?;

        let outcome = match inserted {
            Some(row) => EnrollOutcome::Created(enrollment_from_row(&row)),
            None => {
                // Lost the insert race; the row exists now.
                let row = sqlx::query(
                    r#"
                    SELECT enrollment_id, user_id, course_id, enrolled_at, progress_percent
                    FROM enrollments
                    WHERE user_id = $1 AND course_id = $2
                    "#,
                )
                .bind(user_id)
                .bind(course_id)
                .fetch_one(tx.as_mut())
                .await?;
                EnrollOutcome::AlreadyEnrolled(enrollment_from_row(&row))
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn record_operator_action(&self, action: &OperatorActionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO operator_actions (id, payment_id, actor, action, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(action.id)
        .bind(action.payment_id)
        .bind(&action.actor)
        .bind(&action.action)
        .bind(&action.reason)
        .bind(action.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_operator_actions(&self, payment_id: Uuid) -> Result<Vec<OperatorActionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, payment_id, actor, action, reason, created_at
            FROM operator_actions
            WHERE payment_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OperatorActionRecord {
                id: r.get("id"),
                payment_id: r.get("payment_id"),
                actor: r.get("actor"),
                action: r.get("action"),
                reason: r.get("reason"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
