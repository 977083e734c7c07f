//! ECB daily euro foreign exchange reference rates.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use rust_decimal::Decimal;

use crate::core::{EUR, EcbRates, ExchangeRateSource, SourceError};

/// Namespace of the `Cube` elements in the eurofxref feed.
pub const ECB_EUROFXREF_XML_NS: &str = "http://www.ecb.int/vocabulary/2002-08-01/eurofxref";

/// Parse the eurofxref-daily document.
///
/// Rates are read from `Cube/Cube/Cube` elements in the eurofxref
/// namespace; `Cube` elements in any other namespace are ignored. The
/// result always contains `EUR → 1`.
///
/// # Errors
///
/// [`SourceError::Parse`] on malformed XML, missing attributes or
/// non-numeric rates.
pub fn parse_eurofxref(xml: &str) -> Result<EcbRates, SourceError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut rates = BTreeMap::new();
    rates.insert(EUR.to_string(), Decimal::ONE);
    let mut reference_date = None;
    let mut depth = 0usize;

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| SourceError::Parse(format!("XML parse error: {e}")))?;
        let in_ecb_ns = ns == ResolveResult::Bound(Namespace(ECB_EUROFXREF_XML_NS.as_bytes()));
        match event {
            Event::Start(ref e) if in_ecb_ns && e.local_name().as_ref() == b"Cube" => {
                depth += 1;
                visit_cube(e, depth, &mut rates, &mut reference_date)?;
            }
            Event::Empty(ref e) if in_ecb_ns && e.local_name().as_ref() == b"Cube" => {
                visit_cube(e, depth + 1, &mut rates, &mut reference_date)?;
            }
            Event::End(ref e) if in_ecb_ns && e.local_name().as_ref() == b"Cube" => {
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(EcbRates {
        reference_date,
        rates,
    })
}

fn visit_cube(
    e: &BytesStart<'_>,
    depth: usize,
    rates: &mut BTreeMap<String, Decimal>,
    reference_date: &mut Option<NaiveDate>,
) -> Result<(), SourceError> {
    match depth {
        2 => {
            if let Some(time) = attribute(e, "time")? {
                let date = NaiveDate::parse_from_str(&time, "%Y-%m-%d")
                    .map_err(|err| SourceError::Parse(format!("invalid cube time '{time}': {err}")))?;
                *reference_date = Some(date);
            }
        }
        3 => {
            let currency = attribute(e, "currency")?
                .ok_or_else(|| SourceError::Parse("rate cube without currency".into()))?;
            let raw = attribute(e, "rate")?
                .ok_or_else(|| SourceError::Parse(format!("no rate for {currency}")))?;
            let rate = Decimal::from_str(raw.trim())
                .map_err(|err| SourceError::Parse(format!("invalid rate for {currency}: {err}")))?;
            rates.insert(currency, rate);
        }
        _ => {}
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, SourceError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| SourceError::Parse(format!("invalid attribute: {err}")))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|err| SourceError::Parse(format!("invalid attribute value: {err}")))
    })
    .transpose()
}

/// HTTP client for the eurofxref feed.
#[derive(Debug, Clone)]
pub struct EcbClient {
    client: reqwest::Client,
    url: String,
}

impl EcbClient {
    /// Client for the feed at `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ExchangeRateSource for EcbClient {
    async fn fetch_rates(&self) -> Result<EcbRates, SourceError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_eurofxref(&body)
    }
}
