//! Country table, pricing rules, caches, configuration and the VAT service.
//!
//! This module has no network code of its own: [`VatService`] talks to the
//! remote services through the traits in [`sources`], implemented over HTTP
//! in [`crate::remote`].

mod cache;
mod config;
mod countries;
mod error;
mod pricing;
mod service;
pub mod sources;
mod types;

pub use cache::*;
pub use config::*;
pub use countries::*;
pub use error::*;
pub use pricing::*;
pub use service::*;
pub use sources::{ExchangeRateSource, VatNumberRegistry, VatRateSource};
pub use types::*;
