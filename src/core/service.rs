use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::cache::{Cache, Clock, ExpiryPolicy, SystemClock};
use super::config::Settings;
use super::countries::EuCountry;
use super::error::{SourceError, VatError};
use super::pricing::{EUR, compute_amounts, cross_rate, should_charge_vat};
use super::sources::{ExchangeRateSource, VatNumberRegistry, VatRateSource};
use super::types::{CheckRequest, ExchangeRateSnapshot, PricingResult, VatRates};

/// VAT rate lookup, VAT number validation, exchange rates and pricing.
///
/// Holds the two process-wide caches: one exchange-rate snapshot per day and
/// one rate table per country.
#[derive(Debug)]
pub struct VatService {
    settings: Arc<Settings>,
    exchange_rates: Arc<dyn ExchangeRateSource>,
    vat_rates: Arc<dyn VatRateSource>,
    registry: Arc<dyn VatNumberRegistry>,
    clock: Arc<dyn Clock>,
    fx_cache: Cache<NaiveDate, Arc<ExchangeRateSnapshot>>,
    rate_cache: Cache<&'static str, Arc<VatRates>>,
}

impl VatService {
    pub fn builder(settings: Settings) -> VatServiceBuilder {
        VatServiceBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether a buyer in `country` pays VAT given the validity of their number.
    pub fn should_charge_vat(&self, country: &str, has_valid_vat_number: bool) -> bool {
        should_charge_vat(
            country,
            self.settings.own_country.as_deref(),
            has_valid_vat_number,
        )
    }

    /// VAT percentage of `rate_type` (default: configured label) in `country_code`.
    ///
    /// Rates are fetched once per country and cached. Returns `Ok(None)` if
    /// the country has no rate of that type.
    ///
    /// # Errors
    ///
    /// [`VatError::NotEuCountry`] for non-EU codes, [`VatError::RateService`]
    /// if the rate service fails (nothing is cached in that case).
    pub async fn get_vat_rate(
        &self,
        country_code: &str,
        rate_type: Option<&str>,
    ) -> Result<Option<Decimal>, VatError> {
        let country = EuCountry::parse(country_code)?;
        let rates = match self.rate_cache.get(&country.code) {
            Some(rates) => {
                debug!(country = country.code, "VAT rate cache hit");
                rates
            }
            None => self.load_vat_rates(country).await?,
        };
        Ok(rates.get(self.rate_type(rate_type)))
    }

    /// Like [`get_vat_rate`](Self::get_vat_rate) but always asks the rate
    /// service and replaces the cached entry.
    pub async fn refresh_vat_rate(
        &self,
        country_code: &str,
        rate_type: Option<&str>,
    ) -> Result<Option<Decimal>, VatError> {
        let country = EuCountry::parse(country_code)?;
        let rates = self.load_vat_rates(country).await?;
        Ok(rates.get(self.rate_type(rate_type)))
    }

    async fn load_vat_rates(&self, country: EuCountry) -> Result<Arc<VatRates>, VatError> {
        let today = self.clock.today();
        debug!(country = country.code, %today, "requesting VAT rates");
        let entries = self
            .vat_rates
            .rates(country.code, today)
            .await
            .map_err(|source| VatError::RateService {
                country: country.code.to_string(),
                source,
            })?;
        let rates: Arc<VatRates> = Arc::new(entries.into_iter().collect());
        if rates.is_empty() {
            warn!(country = country.code, "rate service returned no rates");
        }
        self.rate_cache.insert(country.code, Arc::clone(&rates));
        Ok(rates)
    }

    fn rate_type<'a>(&'a self, rate_type: Option<&'a str>) -> &'a str {
        rate_type
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.settings.vat_rate)
    }

    /// Check a VAT number (with country prefix) against the registry.
    ///
    /// A SOAP fault from the registry yields `Ok(false)`.
    ///
    /// # Errors
    ///
    /// [`VatError::VatNumberTooShort`] below three characters (no network
    /// call is made), [`VatError::Registry`] on transport or parse failures.
    pub async fn validate_vat_number(&self, vat_number: &str) -> Result<bool, VatError> {
        let split = match vat_number.char_indices().nth(2) {
            Some((idx, _)) => idx,
            None => return Err(VatError::VatNumberTooShort(vat_number.to_string())),
        };
        let (prefix, body) = vat_number.split_at(split);
        let prefix = prefix.to_uppercase();

        match self.registry.check_vat(&prefix, body).await {
            Ok(result) => {
                debug!(prefix = %prefix, valid = result.valid, "VAT number checked");
                Ok(result.valid)
            }
            Err(SourceError::Fault(fault)) => {
                warn!(prefix = %prefix, %fault, "VAT number registry fault, treating as invalid");
                Ok(false)
            }
            Err(e) => Err(VatError::Registry(e)),
        }
    }

    /// Today's ECB reference rates, fetched at most once per day.
    ///
    /// # Errors
    ///
    /// [`VatError::ExchangeRates`] if the feed cannot be fetched or parsed.
    /// There is no fallback to an older snapshot.
    pub async fn fetch_exchange_rates(&self) -> Result<Arc<ExchangeRateSnapshot>, VatError> {
        let today = self.clock.today();
        if let Some(snapshot) = self.fx_cache.get(&today) {
            return Ok(snapshot);
        }
        self.fx_cache.purge_expired();
        debug!(%today, "fetching ECB reference rates");
        let fetched = self
            .exchange_rates
            .fetch_rates()
            .await
            .map_err(VatError::ExchangeRates)?;
        let snapshot = Arc::new(ExchangeRateSnapshot {
            fetched_on: today,
            reference_date: fetched.reference_date,
            rates: fetched.rates,
        });
        self.fx_cache.insert(today, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Rate converting `src_currency` (default EUR) into the currency of `country_code`.
    ///
    /// # Errors
    ///
    /// [`VatError::NotEuCountry`], [`VatError::UnsupportedCurrency`] when the
    /// source currency is not in the ECB feed, or feed errors.
    pub async fn get_exchange_rate(
        &self,
        country_code: &str,
        src_currency: Option<&str>,
    ) -> Result<Decimal, VatError> {
        let country = EuCountry::parse(country_code)?;
        let src = normalize_currency(src_currency);
        let snapshot = self.fetch_exchange_rates().await?;
        cross_rate(&snapshot, country.currency, &src)
    }

    /// Price check for a buyer: VAT rate, VAT number validity, charging
    /// decision, exchange rate and, if `amount` is non-zero, the amounts.
    ///
    /// Every lookup is performed, including ones the charging decision
    /// makes irrelevant.
    pub async fn check(&self, request: CheckRequest) -> Result<PricingResult, VatError> {
        let country = EuCountry::parse(&request.country_code)?;
        let vat_number = request.vat_number.filter(|n| !n.is_empty());
        let src_currency = normalize_currency(request.src_currency.as_deref());

        let is_vat_number_valid = match vat_number.as_deref() {
            Some(number) => self.validate_vat_number(number).await?,
            None => false,
        };
        let vat_rate = self.get_vat_rate(country.code, None).await?;
        let exchange_rate = self
            .get_exchange_rate(country.code, Some(src_currency.as_str()))
            .await?;
        let should_charge_vat = self.should_charge_vat(country.code, is_vat_number_valid);

        let amounts = match request.amount.filter(|a| !a.is_zero()) {
            Some(amount) => Some(
                compute_amounts(amount, vat_rate, should_charge_vat, exchange_rate).map_err(
                    |e| match e {
                        VatError::RateUnavailable { .. } => VatError::RateUnavailable {
                            country: country.code.to_string(),
                            rate_type: self.settings.vat_rate.clone(),
                        },
                        other => other,
                    },
                )?,
            ),
            None => None,
        };

        Ok(PricingResult {
            country: country.code.to_string(),
            currency: country.currency.to_string(),
            vat_rate,
            vat_number,
            is_vat_number_valid,
            should_charge_vat,
            exchange_rate,
            src_currency,
            amounts,
        })
    }
}

fn normalize_currency(currency: Option<&str>) -> String {
    currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map_or_else(|| EUR.to_string(), str::to_ascii_uppercase)
}

/// Builder for [`VatService`].
pub struct VatServiceBuilder {
    settings: Settings,
    exchange_rates: Option<Arc<dyn ExchangeRateSource>>,
    vat_rates: Option<Arc<dyn VatRateSource>>,
    registry: Option<Arc<dyn VatNumberRegistry>>,
    clock: Arc<dyn Clock>,
}

impl VatServiceBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            exchange_rates: None,
            vat_rates: None,
            registry: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn exchange_rates(mut self, source: Arc<dyn ExchangeRateSource>) -> Self {
        self.exchange_rates = Some(source);
        self
    }

    pub fn vat_rates(mut self, source: Arc<dyn VatRateSource>) -> Self {
        self.vat_rates = Some(source);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn VatNumberRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the service.
    ///
    /// # Errors
    ///
    /// [`VatError::Config`] if a source is missing.
    pub fn build(self) -> Result<VatService, VatError> {
        let missing = |what: &str| VatError::Config(format!("{what} source not configured"));
        let rate_policy = self
            .settings
            .vat_rate_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
            .map_or(ExpiryPolicy::Never, ExpiryPolicy::After);
        Ok(VatService {
            exchange_rates: self.exchange_rates.ok_or_else(|| missing("exchange rate"))?,
            vat_rates: self.vat_rates.ok_or_else(|| missing("VAT rate"))?,
            registry: self.registry.ok_or_else(|| missing("VAT number registry"))?,
            fx_cache: Cache::new(ExpiryPolicy::EndOfDay, Arc::clone(&self.clock)),
            rate_cache: Cache::new(rate_policy, Arc::clone(&self.clock)),
            clock: self.clock,
            settings: Arc::new(self.settings),
        })
    }
}
