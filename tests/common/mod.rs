//! In-memory ECB/TIC/VIES stand-ins shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use euvat::core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Counts calls and serves canned data.
///
/// VIES: numbers starting with `1` are valid, `FAULT` yields a SOAP fault,
/// `DOWN` a network error. TIC: countries in `faulty` (initially `GB`)
/// fault, every other country gets its entry from `standard` (20 if
/// absent) plus a reduced rate of 10.
pub struct Fixture {
    pub fx_calls: AtomicUsize,
    pub rate_calls: AtomicUsize,
    pub vies_calls: AtomicUsize,
    pub fx_down: AtomicBool,
    pub standard: Mutex<HashMap<String, Decimal>>,
    pub faulty: Mutex<Vec<String>>,
}

impl Default for Fixture {
    fn default() -> Self {
        let standard = [("FR", dec!(20)), ("DE", dec!(19)), ("IE", dec!(23)), ("SE", dec!(25))]
            .into_iter()
            .map(|(c, r)| (c.to_string(), r))
            .collect();
        Self {
            fx_calls: AtomicUsize::new(0),
            rate_calls: AtomicUsize::new(0),
            vies_calls: AtomicUsize::new(0),
            fx_down: AtomicBool::new(false),
            standard: Mutex::new(standard),
            faulty: Mutex::new(vec!["GB".into()]),
        }
    }
}

impl Fixture {
    pub fn set_standard(&self, country: &str, rate: Decimal) {
        self.standard.lock().unwrap().insert(country.into(), rate);
    }

    /// Let the rate service answer for every country.
    pub fn heal_rate_service(&self) {
        self.faulty.lock().unwrap().clear();
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn ecb_rates() -> BTreeMap<String, Decimal> {
    [
        ("EUR", dec!(1)),
        ("USD", dec!(1.0876)),
        ("SEK", dec!(11.2345)),
        ("GBP", dec!(0.8451)),
        ("CZK", dec!(24.689)),
        ("PLN", dec!(4.3)),
        ("DKK", dec!(7.4601)),
    ]
    .into_iter()
    .map(|(c, r)| (c.to_string(), r))
    .collect()
}

#[async_trait]
impl ExchangeRateSource for Fixture {
    async fn fetch_rates(&self) -> Result<EcbRates, SourceError> {
        self.fx_calls.fetch_add(1, Ordering::SeqCst);
        if self.fx_down.load(Ordering::SeqCst) {
            return Err(SourceError::Network("connection refused".into()));
        }
        Ok(EcbRates {
            reference_date: NaiveDate::from_ymd_opt(2024, 6, 14),
            rates: ecb_rates(),
        })
    }
}

#[async_trait]
impl VatRateSource for Fixture {
    async fn rates(&self, member_state: &str, _date: NaiveDate) -> Result<Vec<RateEntry>, SourceError> {
        self.rate_calls.fetch_add(1, Ordering::SeqCst);
        if self.faulty.lock().unwrap().iter().any(|c| c == member_state) {
            return Err(SourceError::Fault("INVALID_MEMBER_STATE".into()));
        }
        let standard = self
            .standard
            .lock()
            .unwrap()
            .get(member_state)
            .copied()
            .unwrap_or(dec!(20));
        Ok(vec![
            RateEntry {
                rate_type: "STANDARD".into(),
                value: standard,
            },
            RateEntry {
                rate_type: "REDUCED".into(),
                value: dec!(10),
            },
        ])
    }
}

#[async_trait]
impl VatNumberRegistry for Fixture {
    async fn check_vat(&self, _country_code: &str, number: &str) -> Result<ViesResult, SourceError> {
        self.vies_calls.fetch_add(1, Ordering::SeqCst);
        match number {
            "FAULT" => Err(SourceError::Fault("MS_UNAVAILABLE".into())),
            "DOWN" => Err(SourceError::Network("timed out".into())),
            n => Ok(ViesResult {
                valid: n.starts_with('1'),
                ..ViesResult::default()
            }),
        }
    }
}

pub fn start_of_test_day() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 14, 10, 0, 0).unwrap()
}

/// Service over a fresh fixture with a manual clock at 2024-06-14 10:00 UTC.
pub fn service_with(settings: Settings) -> (VatService, Arc<Fixture>, Arc<ManualClock>) {
    let fixture = Arc::new(Fixture::default());
    let clock = Arc::new(ManualClock::new(start_of_test_day()));
    let service = VatService::builder(settings)
        .exchange_rates(fixture.clone())
        .vat_rates(fixture.clone())
        .registry(fixture.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    (service, fixture, clock)
}

/// Service for a seller based in `own_country`.
pub fn service_for(own_country: &str) -> (VatService, Arc<Fixture>, Arc<ManualClock>) {
    service_with(Settings::default().with_own_country(own_country))
}
