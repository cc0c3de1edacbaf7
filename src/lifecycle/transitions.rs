use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::webhook::GatewayNotification;
use crate::lifecycle::Transition;

/// Pure transition table. Storage guards (compare-and-set on status) enforce
/// the same rules under concurrency; this function decides, the store applies.
pub fn decide(payment: &Payment, notification: &GatewayNotification) -> Transition {
    if notification.is_refund {
        return match payment.status {
            PaymentStatus::Completed => Transition::Refund,
            status => Transition::Reject {
                reason: format!("refund notification for {} payment", status.as_str()),
            },
        };
    }

    if notification.success {
        return match payment.status {
            PaymentStatus::Pending => {
                if notification.amount_cents != payment.amount_cents
                    || notification.currency != payment.currency
                {
                    Transition::Reject {
                        reason: format!(
                            "amount mismatch: notified {} {}, expected {} {}",
                            notification.amount_cents,
                            notification.currency,
                            payment.amount_cents,
                            payment.currency
                        ),
                    }
                } else {
                    Transition::Complete
                }
            }
            PaymentStatus::Completed => Transition::ConfirmCompleted,
            status => Transition::Reject {
                reason: format!("success notification for {} payment", status.as_str()),
            },
        };
    }

    match payment.status {
        PaymentStatus::Pending => Transition::Fail {
            reason: notification
                .failure_message
                .clone()
                .or_else(|| notification.failure_code.clone())
                .unwrap_or_else(|| "gateway reported failure".to_string()),
        },
        status => Transition::Reject {
            reason: format!("failure notification for {} payment", status.as_str()),
        },
    }
}
