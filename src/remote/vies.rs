//! EU VIES SOAP client for VAT number validation.

use std::time::Duration;

use async_trait::async_trait;

use super::soap::{self, EnvelopeWriter, Node};
use crate::core::{SourceError, VatNumberRegistry, ViesResult};

/// Types namespace of the `checkVat` service.
pub const VIES_TYPES_NS: &str = "urn:ec.europa.eu:taxud:vies:services:checkVat:types";

/// Build the `checkVat` request envelope.
///
/// `country_code` is upper-cased; `vat_number` is the number part without
/// the country prefix.
pub fn check_vat_request(country_code: &str, vat_number: &str) -> Result<String, SourceError> {
    let mut w = EnvelopeWriter::new("urn", VIES_TYPES_NS, "checkVat")?;
    w.text_element("urn:countryCode", &country_code.to_uppercase())?;
    w.text_element("urn:vatNumber", vat_number)?;
    w.finish()
}

/// Parse a `checkVatResponse`.
///
/// # Errors
///
/// [`SourceError::Fault`] when the registry answered with a SOAP fault
/// (e.g. `INVALID_INPUT`, `MS_UNAVAILABLE`), [`SourceError::Parse`] when the
/// document is malformed or has no `valid` element.
pub fn parse_check_vat_response(xml: &str) -> Result<ViesResult, SourceError> {
    let nodes = soap::read_nodes(xml)?;
    if let Some(fault) = soap::find_fault(&nodes) {
        return Err(SourceError::Fault(fault));
    }
    result_from_nodes(&nodes)
}

fn result_from_nodes(nodes: &[Node]) -> Result<ViesResult, SourceError> {
    let valid = match soap::first_text(nodes, "valid") {
        Some(v) if v.eq_ignore_ascii_case("true") => true,
        Some(v) if v.eq_ignore_ascii_case("false") => false,
        Some(v) => return Err(SourceError::Parse(format!("invalid 'valid' value: {v}"))),
        None => return Err(SourceError::Parse("response has no 'valid' element".into())),
    };

    Ok(ViesResult {
        valid,
        request_date: present(soap::first_text(nodes, "requestDate")),
        name: present(soap::first_text(nodes, "name")),
        address: present(soap::first_text(nodes, "address")),
    })
}

// The registry sends "---" for undisclosed values.
fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "---")
        .map(str::to_string)
}

/// SOAP client for the VIES `checkVat` service.
#[derive(Debug, Clone)]
pub struct ViesClient {
    client: reqwest::Client,
    url: String,
}

impl ViesClient {
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
impl VatNumberRegistry for ViesClient {
    async fn check_vat(&self, country_code: &str, number: &str) -> Result<ViesResult, SourceError> {
        let envelope = check_vat_request(country_code, number)?;
        let nodes = soap::call(&self.client, &self.url, "", envelope).await?;
        let result = result_from_nodes(&nodes)?;
        tracing::debug!(country_code, valid = result.valid, "VIES check");
        Ok(result)
    }
}
