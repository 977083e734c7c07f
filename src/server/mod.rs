//! HTTP surface: axum routes under `/eu-vat`, error mapping and tracing setup.

mod error;
mod routes;
pub mod telemetry;

pub use error::AppError;
pub use routes::router;
