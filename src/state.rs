use mongodb::Database;
use std::sync::Arc;

use crate::services::payment_service::PaymentService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub payment_service: Option<Arc<PaymentService>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState {
            db,
            payment_service: None,
        }
    }

    pub fn with_payments(mut self, payment_service: Arc<PaymentService>) -> Self {
        self.payment_service = Some(payment_service);
        self
    }
}
