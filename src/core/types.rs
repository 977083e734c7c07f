use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily euro reference rates: currency → units per 1 EUR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSnapshot {
    /// Calendar day the snapshot was fetched (cache key).
    pub fetched_on: NaiveDate,
    /// Reference date published in the feed, if any.
    pub reference_date: Option<NaiveDate>,
    /// Rates including the implicit `EUR → 1`.
    pub rates: BTreeMap<String, Decimal>,
}

impl ExchangeRateSnapshot {
    /// Rate for `currency` against EUR.
    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }
}

/// Parsed ECB feed contents before they are stamped with a fetch date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EcbRates {
    /// `time` attribute of the daily cube.
    pub reference_date: Option<NaiveDate>,
    /// Currency → rate, always containing `EUR → 1`.
    pub rates: BTreeMap<String, Decimal>,
}

/// One rate reported by the rate service for a member state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateEntry {
    /// Rate type label as reported (e.g. "STANDARD", "REDUCED").
    pub rate_type: String,
    /// Percentage.
    pub value: Decimal,
}

/// VAT rates of one country keyed by lower-cased rate type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VatRates(HashMap<String, Decimal>);

impl VatRates {
    /// Percentage for `rate_type` (case-insensitive).
    pub fn get(&self, rate_type: &str) -> Option<Decimal> {
        self.0.get(&rate_type.to_lowercase()).copied()
    }

    /// Number of rate types known.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the service reported no rates at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<RateEntry> for VatRates {
    fn from_iter<T: IntoIterator<Item = RateEntry>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|e| (e.rate_type.to_lowercase(), e.value))
                .collect(),
        )
    }
}

/// Result of a VAT number registry check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViesResult {
    /// Whether the VAT number is currently valid.
    pub valid: bool,
    /// Date of the request as reported by the registry.
    pub request_date: Option<String>,
    /// Registered company name (if available).
    pub name: Option<String>,
    /// Registered address (if available).
    pub address: Option<String>,
}

/// Input of a pricing check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckRequest {
    /// Buyer country (must be an EU country).
    pub country_code: String,
    /// Buyer VAT number including the country prefix.
    #[serde(default)]
    pub vat_number: Option<String>,
    /// Net amount in the source currency.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    /// Currency of `amount` (default EUR).
    #[serde(default)]
    pub src_currency: Option<String>,
}

impl CheckRequest {
    /// Request for `country_code` with no VAT number or amount.
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ..Self::default()
        }
    }

    pub fn vat_number(mut self, vat_number: impl Into<String>) -> Self {
        self.vat_number = Some(vat_number.into());
        self
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn src_currency(mut self, currency: impl Into<String>) -> Self {
        self.src_currency = Some(currency.into());
        self
    }
}

/// VAT-inclusive amounts for a pricing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountBreakdown {
    /// Net amount as supplied.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// VAT due, rounded to cents.
    #[serde(with = "rust_decimal::serde::float")]
    pub vat_amount: Decimal,
    /// Net amount plus VAT, unrounded.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_with_vat: Decimal,
    /// `amount_with_vat` in the country's currency, rounded to cents.
    #[serde(with = "rust_decimal::serde::float")]
    pub exchanged_amount_with_vat: Decimal,
}

/// Outcome of [`VatService::check`](super::VatService::check).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingResult {
    pub country: String,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub vat_rate: Option<Decimal>,
    pub vat_number: Option<String>,
    pub is_vat_number_valid: bool,
    pub should_charge_vat: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub exchange_rate: Decimal,
    pub src_currency: String,
    /// Present only when a non-zero amount was supplied.
    #[serde(flatten)]
    pub amounts: Option<AmountBreakdown>,
}
