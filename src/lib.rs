pub mod config;
pub mod domain {
    pub mod course;
    pub mod enrollment;
    pub mod operator;
    pub mod payment;
    pub mod webhook;
}
pub mod gateways;
pub mod http;
pub mod lifecycle;
pub mod repo;
pub mod service;
pub mod signature;

use std::sync::Arc;

use crate::repo::ReconciliationStore;
use crate::service::operator::OperatorService;
use crate::service::payments::PaymentService;
use crate::service::reconciler::EnrollmentReconciler;
use crate::service::webhooks::WebhookProcessor;
use crate::signature::SignatureVerifier;

#[derive(Clone)]
pub struct AppState {
    pub payments: PaymentService,
    pub webhooks: WebhookProcessor,
    pub operator: OperatorService,
    pub verifier: SignatureVerifier,
    pub store: Arc<dyn ReconciliationStore>,
    pub redis_client: redis::Client,
    pub internal_api_key: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReconciliationStore>,
        gateway: Arc<dyn crate::gateways::CheckoutGateway>,
        verifier: SignatureVerifier,
        redis_client: redis::Client,
        internal_api_key: String,
    ) -> Self {
        let reconciler = EnrollmentReconciler {
            store: store.clone(),
        };
        AppState {
            payments: PaymentService {
                store: store.clone(),
                gateway,
            },
            webhooks: WebhookProcessor {
                store: store.clone(),
                reconciler: reconciler.clone(),
            },
            operator: OperatorService {
                store: store.clone(),
                reconciler,
            },
            verifier,
            store,
            redis_client,
            internal_api_key,
        }
    }
}
