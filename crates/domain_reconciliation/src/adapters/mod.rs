//! Gateway adapters

pub mod http_gateway;

pub use http_gateway::{HttpGatewayConfig, HttpPaymentGateway};
