use thiserror::Error;

/// Errors returned by the VAT service and its integration points.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VatError {
    /// The country code is not in the EU table.
    #[error("not an EU country: {0}")]
    NotEuCountry(String),

    /// VAT numbers need a two-letter prefix and at least one more character.
    #[error("VAT number too short: '{0}'")]
    VatNumberTooShort(String),

    /// Cross rates are only available for currencies in the ECB feed.
    #[error("can only use a currency listed in the ECB rates, got '{0}'")]
    UnsupportedCurrency(String),

    /// The amount is too large to price.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    /// VAT has to be charged but the requested rate type is unknown for the country.
    #[error("no '{rate_type}' VAT rate known for {country}")]
    RateUnavailable { country: String, rate_type: String },

    /// The VAT rate service failed or returned a fault.
    #[error("VAT rate service unavailable for {country}: {source}")]
    RateService {
        country: String,
        #[source]
        source: SourceError,
    },

    /// The VAT number registry could not be reached or answered garbage.
    #[error("VAT number registry error: {0}")]
    Registry(#[source] SourceError),

    /// Fetching the ECB reference rates failed.
    #[error("exchange rate feed error: {0}")]
    ExchangeRates(#[source] SourceError),

    /// The feed does not list the destination currency.
    #[error("no exchange rate for {0} in the ECB feed")]
    ExchangeRateUnavailable(String),

    /// Record persistence failed.
    #[error("record store error: {0}")]
    Store(String),

    /// Schema augmentation failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl VatError {
    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotEuCountry(_)
                | Self::VatNumberTooShort(_)
                | Self::UnsupportedCurrency(_)
                | Self::AmountOutOfRange(_)
                | Self::RateUnavailable { .. }
        )
    }
}

/// Failure talking to one of the remote services (ECB, TIC, VIES).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status without a SOAP fault in the body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered with a SOAP fault.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// The response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}
