//! TIC `VatRateWebService` client: VAT rates per member state.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::soap::{self, EnvelopeWriter, Node};
use crate::core::{RateEntry, SourceError, VatRateSource};

/// Types namespace of the rate service.
pub const TIC_TYPES_NS: &str = "urn:ec.europa.eu:taxud:tic:services:VatRateWebService:types";

/// Build the `getRates` request envelope.
pub fn rates_request(member_state: &str, date: NaiveDate) -> Result<String, SourceError> {
    let mut w = EnvelopeWriter::new("tic", TIC_TYPES_NS, "getRates")?;
    w.text_element("tic:memberState", member_state)?;
    w.text_element("tic:requestDate", &date.format("%Y-%m-%d").to_string())?;
    w.finish()
}

/// Parse a `getRates` response into rate entries.
///
/// Each `rate` element contributes its `type` and `value` children.
///
/// # Errors
///
/// [`SourceError::Fault`] for SOAP faults, [`SourceError::Parse`] for
/// malformed XML, incomplete `rate` elements or non-numeric values.
pub fn parse_rates_response(xml: &str) -> Result<Vec<RateEntry>, SourceError> {
    let nodes = soap::read_nodes(xml)?;
    if let Some(fault) = soap::find_fault(&nodes) {
        return Err(SourceError::Fault(fault));
    }
    rates_from_nodes(&nodes)
}

fn rates_from_nodes(nodes: &[Node]) -> Result<Vec<RateEntry>, SourceError> {
    let mut entries = Vec::new();
    let mut in_rate = false;
    let mut field: Option<&str> = None;
    let mut rate_type: Option<String> = None;
    let mut value: Option<String> = None;

    for node in nodes {
        match node {
            Node::Start(name) if name == "rate" => {
                in_rate = true;
                rate_type = None;
                value = None;
            }
            Node::Start(name) if in_rate => field = Some(name.as_str()),
            Node::Text(text) if in_rate => match field {
                Some("type") => rate_type = Some(text.clone()),
                Some("value") => value = Some(text.clone()),
                _ => {}
            },
            Node::End(name) if name == "rate" && in_rate => {
                in_rate = false;
                let rate_type = rate_type
                    .take()
                    .ok_or_else(|| SourceError::Parse("rate without type".into()))?;
                let raw = value
                    .take()
                    .ok_or_else(|| SourceError::Parse(format!("no value for rate {rate_type}")))?;
                let value = Decimal::from_str(raw.trim()).map_err(|e| {
                    SourceError::Parse(format!("invalid value '{raw}' for rate {rate_type}: {e}"))
                })?;
                entries.push(RateEntry { rate_type, value });
            }
            Node::End(_) => field = None,
            _ => {}
        }
    }
    Ok(entries)
}

/// SOAP client for the TIC rate service.
#[derive(Debug, Clone)]
pub struct TicClient {
    client: reqwest::Client,
    url: String,
}

impl TicClient {
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
impl VatRateSource for TicClient {
    async fn rates(
        &self,
        member_state: &str,
        date: NaiveDate,
    ) -> Result<Vec<RateEntry>, SourceError> {
        let envelope = rates_request(member_state, date)?;
        let nodes = soap::call(&self.client, &self.url, "getRates", envelope).await?;
        rates_from_nodes(&nodes)
    }
}
