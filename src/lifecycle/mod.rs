pub mod transitions;

/// Outcome of evaluating a gateway notification against the current payment
/// state. Only `Complete`, `Fail` and `Refund` mutate the payment.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// PENDING -> COMPLETED.
    Complete,
    /// PENDING -> FAILED.
    Fail { reason: String },
    /// COMPLETED -> REFUNDED.
    Refund,
    /// Success redelivered for an already COMPLETED payment: no status
    /// change, but the enrollment is re-checked. This is the retry path for
    /// a completion whose enrollment step previously failed.
    ConfirmCompleted,
    /// Illegal for the current state. Recorded on the webhook record and
    /// acknowledged without being applied, so out-of-order deliveries can
    /// never overwrite a terminal state.
    Reject { reason: String },
}
