use std::sync::Arc;

use axum::http::StatusCode;
use uuid::Uuid;

use crate::domain::payment::{
    internal, ErrorEnvelope, InitiatePaymentResponse, NewPayment, PaymentStatusView, ServiceError,
};
use crate::gateways::{CheckoutGateway, CheckoutRequest};
use crate::repo::ReconciliationStore;

/// Initiation and status surface. Creates the PENDING payment row and asks
/// the gateway for a checkout session; everything after that is driven by
/// webhooks and the operator console.
#[derive(Clone)]
pub struct PaymentService {
    pub store: Arc<dyn ReconciliationStore>,
    pub gateway: Arc<dyn CheckoutGateway>,
}

impl PaymentService {
    pub async fn initiate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<InitiatePaymentResponse, ServiceError> {
        let course = self
            .store
            .find_course(course_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    ErrorEnvelope::new("COURSE_NOT_FOUND", "course does not exist"),
                )
            })?;

        if !course.is_published {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new("COURSE_NOT_PUBLISHED", "course is not open for purchase"),
            ));
        }
        if course.price_cents <= 0 {
            return Err((
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::new(
                    "COURSE_NOT_PURCHASABLE",
                    "course has no positive price; use the free enrollment path",
                ),
            ));
        }

        if self
            .store
            .find_enrollment(user_id, course_id)
            .await
            .map_err(internal)?
            .is_some()
        {
            return Err((
                StatusCode::CONFLICT,
                ErrorEnvelope::new("ALREADY_ENROLLED", "user already has access to this course"),
            ));
        }

        if self
            .store
            .find_open_payment(user_id, course_id)
            .await
            .map_err(internal)?
            .is_some()
        {
            return Err((
                StatusCode::CONFLICT,
                ErrorEnvelope::new(
                    "PAYMENT_ALREADY_PENDING",
                    "a payment for this course is already in progress",
                ),
            ));
        }

        let order_ref = format!("ord_{}", Uuid::new_v4().simple());
        let payment = self
            .store
            .insert_payment(&NewPayment {
                payment_id: Uuid::new_v4(),
                user_id,
                course_id,
                amount_cents: course.price_cents,
                currency: course.currency.clone(),
                order_ref: order_ref.clone(),
            })
            .await
            .map_err(internal)?;

        let session = match self
            .gateway
            .create_checkout(CheckoutRequest {
                order_ref,
                amount_cents: payment.amount_cents,
                currency: payment.currency.clone(),
                course_title: course.title.clone(),
                user_id,
            })
            .await
        {
            Ok(session) => session,
            Err(e) => {
                // The PENDING row stays for later reconciliation or expiry.
                tracing::warn!(payment_id = %payment.payment_id, error = %e, "checkout session failed");
                return Err((
                    StatusCode::BAD_GATEWAY,
                    ErrorEnvelope::new("GATEWAY_ERROR", &e.to_string()),
                ));
            }
        };

        tracing::info!(
            payment_id = %payment.payment_id,
            gateway = self.gateway.name(),
            "payment initiated"
        );

        Ok(InitiatePaymentResponse {
            payment_id: payment.payment_id,
            checkout_url: session.checkout_url,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
        })
    }

    /// Status view for the owner, or for an internal caller (`requester` of
    /// `None`). Non-owners read as not-found so payment ids leak nothing.
    /// Internal reconciliation detail is never surfaced here; an unreconciled
    /// completion reads as COMPLETED with no enrollment yet.
    pub async fn status(
        &self,
        payment_id: Uuid,
        requester: Option<Uuid>,
    ) -> Result<PaymentStatusView, ServiceError> {
        let not_found = || {
            (
                StatusCode::NOT_FOUND,
                ErrorEnvelope::new("PAYMENT_NOT_FOUND", "payment does not exist"),
            )
        };

        let payment = self
            .store
            .find_payment(payment_id)
            .await
            .map_err(internal)?
            .ok_or_else(not_found)?;

        if let Some(requester) = requester {
            if payment.user_id != requester {
                return Err(not_found());
            }
        }

        let enrollment = self
            .store
            .find_enrollment(payment.user_id, payment.course_id)
            .await
            .map_err(internal)?;

        Ok(PaymentStatusView {
            payment_id: payment.payment_id,
            status: payment.status,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            enrollment: enrollment.map(|e| e.summary()),
        })
    }
}
