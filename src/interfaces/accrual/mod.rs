//! Client side of the external accrual-calculation service.

pub mod http_client;

pub use http_client::{AccrualClientConfig, HttpAccrualClient};
