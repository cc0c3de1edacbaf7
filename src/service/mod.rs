pub mod operator;
pub mod payments;
pub mod reconciler;
pub mod webhooks;
