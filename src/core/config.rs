//! Service settings.
//!
//! Defaults match the public EU and ECB endpoints. Everything can be
//! overridden through `EU_VAT_*` environment variables (see
//! [`Settings::from_lookup`]).

use serde::{Deserialize, Serialize};

use super::error::VatError;

/// ECB daily euro reference rates.
pub const ECB_EUROFXREF_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml";

/// VIES `checkVat` SOAP endpoint.
pub const VIES_SOAP_URL: &str = "https://ec.europa.eu/taxation_customs/vies/services/checkVatService";

/// TIC `getRates` SOAP endpoint.
pub const TIC_SOAP_URL: &str = "https://ec.europa.eu/taxation_customs/tic/VatRateWebService";

/// Default customer mention rendered onto EU invoices.
pub const DEFAULT_MENTION: &str = "VAT Number: {number}";

/// Outbound service URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub ecb_eurofxref_url: String,
    pub vies_url: String,
    pub tic_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ecb_eurofxref_url: ECB_EUROFXREF_URL.into(),
            vies_url: VIES_SOAP_URL.into(),
            tic_url: TIC_SOAP_URL.into(),
        }
    }
}

/// Runtime configuration of the VAT feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seller's own country; buyers there are always charged VAT.
    pub own_country: Option<String>,
    /// Rate type used when a lookup does not name one.
    pub vat_rate: String,
    /// Host model augmented with VAT country/number/rate fields.
    pub model: Option<String>,
    /// Template for the invoice customer mention; `{number}` is replaced.
    pub invoice_customer_mention_message: Option<String>,
    /// Lifetime of cached VAT rates in seconds; `None` keeps them for the process lifetime.
    pub vat_rate_ttl_secs: Option<u64>,
    /// Per-request timeout for outbound calls.
    pub http_timeout_secs: u64,
    pub endpoints: Endpoints,
    /// Listen address of the HTTP server.
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            own_country: None,
            vat_rate: "standard".into(),
            model: None,
            invoice_customer_mention_message: Some(DEFAULT_MENTION.into()),
            vat_rate_ttl_secs: None,
            http_timeout_secs: 30,
            endpoints: Endpoints::default(),
            bind_addr: "0.0.0.0:8080".into(),
        }
    }
}

impl Settings {
    /// Settings with the seller's home country set.
    pub fn with_own_country(mut self, country: impl Into<String>) -> Self {
        self.own_country = Some(country.into().to_ascii_uppercase());
        self
    }

    /// Build settings from a variable lookup, falling back to defaults.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `EU_VAT_OWN_COUNTRY` | `own_country` |
    /// | `EU_VAT_RATE_TYPE` | `vat_rate` |
    /// | `EU_VAT_MODEL` | `model` |
    /// | `EU_VAT_INVOICE_MENTION` | `invoice_customer_mention_message` (empty disables) |
    /// | `EU_VAT_RATE_TTL_SECS` | `vat_rate_ttl_secs` |
    /// | `EU_VAT_HTTP_TIMEOUT_SECS` | `http_timeout_secs` |
    /// | `EU_VAT_ECB_URL`, `EU_VAT_VIES_URL`, `EU_VAT_TIC_URL` | `endpoints` |
    /// | `EU_VAT_BIND_ADDR` | `bind_addr` |
    ///
    /// # Errors
    ///
    /// [`VatError::Config`] on unparsable numbers or an own country outside the EU.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VatError> {
        let mut s = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(country) = non_empty("EU_VAT_OWN_COUNTRY") {
            let country = country.trim().to_ascii_uppercase();
            if !super::is_eu_country(&country) {
                return Err(VatError::Config(format!(
                    "EU_VAT_OWN_COUNTRY must be an EU country, got '{country}'"
                )));
            }
            s.own_country = Some(country);
        }
        if let Some(rate) = non_empty("EU_VAT_RATE_TYPE") {
            s.vat_rate = rate;
        }
        s.model = non_empty("EU_VAT_MODEL").or(s.model);
        if let Some(mention) = lookup("EU_VAT_INVOICE_MENTION") {
            s.invoice_customer_mention_message = Some(mention).filter(|m| !m.is_empty());
        }
        if let Some(ttl) = non_empty("EU_VAT_RATE_TTL_SECS") {
            s.vat_rate_ttl_secs = Some(parse_u64("EU_VAT_RATE_TTL_SECS", &ttl)?);
        }
        if let Some(timeout) = non_empty("EU_VAT_HTTP_TIMEOUT_SECS") {
            s.http_timeout_secs = parse_u64("EU_VAT_HTTP_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(url) = non_empty("EU_VAT_ECB_URL") {
            s.endpoints.ecb_eurofxref_url = url;
        }
        if let Some(url) = non_empty("EU_VAT_VIES_URL") {
            s.endpoints.vies_url = url;
        }
        if let Some(url) = non_empty("EU_VAT_TIC_URL") {
            s.endpoints.tic_url = url;
        }
        if let Some(addr) = non_empty("EU_VAT_BIND_ADDR") {
            s.bind_addr = addr;
        }
        Ok(s)
    }

    /// Load `.env` (if present) and read settings from the process environment.
    #[cfg(feature = "server")]
    pub fn from_env() -> Result<Self, VatError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, VatError> {
    value
        .trim()
        .parse()
        .map_err(|e| VatError::Config(format!("{key}: invalid number '{value}': {e}")))
}
