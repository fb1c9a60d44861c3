pub mod connection;
pub mod credentials;
pub mod transactions;
