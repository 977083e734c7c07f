//! EU member state table and settlement currencies.
//!
//! Every lookup in this crate that takes a country code goes through this
//! table; a code that is not listed here is rejected as
//! [`VatError::NotEuCountry`].

use serde::Serialize;

use super::error::VatError;

/// EU country code → settlement currency (ISO 4217).
/// Sorted by country code for binary search.
static EU_COUNTRIES: &[(&str, &str)] = &[
    ("AT", "EUR"), // Austria
    ("BE", "EUR"), // Belgium
    ("BG", "BGN"), // Bulgaria
    ("CY", "EUR"), // Cyprus
    ("CZ", "CZK"), // Czech Republic
    ("DE", "EUR"), // Germany
    ("DK", "DKK"), // Denmark
    ("EE", "EUR"), // Estonia
    ("ES", "EUR"), // Spain
    ("FI", "EUR"), // Finland
    ("FR", "EUR"), // France
    ("GB", "GBP"), // Great Britain
    ("GR", "EUR"), // Greece
    ("HR", "HRK"), // Croatia
    ("HU", "HUF"), // Hungary
    ("IE", "EUR"), // Ireland
    ("IT", "EUR"), // Italy
    ("LT", "EUR"), // Lithuania
    ("LU", "EUR"), // Luxembourg
    ("LV", "EUR"), // Latvia
    ("MT", "EUR"), // Malta
    ("NL", "EUR"), // Netherlands
    ("PL", "PLN"), // Poland
    ("PT", "EUR"), // Portugal
    ("RO", "RON"), // Romania
    ("SE", "SEK"), // Sweden
    ("SI", "EUR"), // Slovenia
    ("SK", "EUR"), // Slovakia
];

fn lookup(code: &str) -> Option<&'static (&'static str, &'static str)> {
    if code.len() != 2 {
        return None;
    }
    let upper = code.to_ascii_uppercase();
    EU_COUNTRIES
        .binary_search_by(|(c, _)| (*c).cmp(upper.as_str()))
        .ok()
        .map(|idx| &EU_COUNTRIES[idx])
}

/// Check whether `code` is an EU country code (case-insensitive).
pub fn is_eu_country(code: &str) -> bool {
    lookup(code).is_some()
}

/// Settlement currency of an EU country, or `None` for non-EU codes.
pub fn currency_for(code: &str) -> Option<&'static str> {
    lookup(code).map(|(_, currency)| *currency)
}

/// All EU countries in code order.
pub fn eu_countries() -> impl Iterator<Item = EuCountry> {
    EU_COUNTRIES
        .iter()
        .map(|(code, currency)| EuCountry { code, currency })
}

/// A country code that has been checked against the EU table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EuCountry {
    /// Upper-case ISO 3166-1 alpha-2 code.
    pub code: &'static str,
    /// Settlement currency (ISO 4217).
    pub currency: &'static str,
}

impl EuCountry {
    /// Resolve `code` (any case) to an EU country.
    ///
    /// # Errors
    ///
    /// Returns [`VatError::NotEuCountry`] when the code is not in the table.
    pub fn parse(code: &str) -> Result<Self, VatError> {
        lookup(code)
            .map(|(code, currency)| EuCountry { code, currency })
            .ok_or_else(|| VatError::NotEuCountry(code.to_string()))
    }
}

impl std::fmt::Display for EuCountry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code)
    }
}
