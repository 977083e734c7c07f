//! HTTP clients for the three public EU services.
//!
//! - [`EcbClient`]: ECB eurofxref daily XML feed
//! - [`TicClient`]: TIC `VatRateWebService` (SOAP)
//! - [`ViesClient`]: VIES `checkVat` (SOAP)
//!
//! The response parsers are public so they can be fuzzed and benchmarked
//! without a network.

mod ecb;
pub mod soap;
mod tic;
mod vies;

pub use ecb::*;
pub use tic::*;
pub use vies::*;

use std::sync::Arc;
use std::time::Duration;

use crate::core::{Settings, VatError, VatService};

/// Build a [`VatService`] wired to the live services named in `settings`.
///
/// # Errors
///
/// [`VatError::Config`] if an HTTP client cannot be constructed.
pub fn service(settings: Settings) -> Result<VatService, VatError> {
    let timeout = Duration::from_secs(settings.http_timeout_secs);
    let endpoints = settings.endpoints.clone();
    let client_err = |e: crate::core::SourceError| VatError::Config(e.to_string());

    let ecb = EcbClient::new(endpoints.ecb_eurofxref_url, timeout).map_err(client_err)?;
    let tic = TicClient::new(endpoints.tic_url, timeout).map_err(client_err)?;
    let vies = ViesClient::new(endpoints.vies_url, timeout).map_err(client_err)?;

    VatService::builder(settings)
        .exchange_rates(Arc::new(ecb))
        .vat_rates(Arc::new(tic))
        .registry(Arc::new(vies))
        .build()
}
