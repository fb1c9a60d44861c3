pub mod momo_gateway;
pub mod payment_service;
