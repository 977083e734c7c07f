//! Seams to the three remote services.
//!
//! [`crate::remote`] provides the HTTP implementations; tests plug in
//! in-memory ones.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::SourceError;
use super::types::{EcbRates, RateEntry, ViesResult};

/// Daily euro reference rates (ECB eurofxref).
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    /// Fetch today's published rates.
    async fn fetch_rates(&self) -> Result<EcbRates, SourceError>;
}

/// Per-country VAT rates (TIC).
#[async_trait]
pub trait VatRateSource: Send + Sync {
    /// All rates in force in `member_state` on `date`.
    async fn rates(
        &self,
        member_state: &str,
        date: NaiveDate,
    ) -> Result<Vec<RateEntry>, SourceError>;
}

/// VAT number registry (VIES).
#[async_trait]
pub trait VatNumberRegistry: Send + Sync {
    /// Check `number` (without prefix) registered in `country_code`.
    async fn check_vat(&self, country_code: &str, number: &str)
    -> Result<ViesResult, SourceError>;
}

impl std::fmt::Debug for dyn ExchangeRateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ExchangeRateSource")
    }
}

impl std::fmt::Debug for dyn VatRateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn VatRateSource")
    }
}

impl std::fmt::Debug for dyn VatNumberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn VatNumberRegistry")
    }
}
