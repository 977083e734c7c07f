use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::events::VatEvent;
use super::invoice::{InvoiceIssuingHook, Invoicing, IssuingInvoice};
use super::records::{EuVatFields, VatRecord, VatRecordStore};
use super::schema::{INVOICE_MODEL_FIELDS, SchemaMigrator, VAT_MODEL_FIELDS};
use crate::core::{Settings, VatError, VatService, eu_countries, is_eu_country, render_mention};

/// The VAT feature as mounted in a host application.
///
/// Wraps a [`VatService`] and adds the host-facing pieces: model
/// augmentation, the rate refresh job and the invoice issuing hook.
#[derive(Debug)]
pub struct EuVatFeature {
    service: Arc<VatService>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<VatEvent>>>,
}

impl EuVatFeature {
    pub fn new(service: Arc<VatService>) -> Self {
        Self {
            service,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn service(&self) -> &Arc<VatService> {
        &self.service
    }

    fn settings(&self) -> &Settings {
        self.service.settings()
    }

    /// Receive every [`VatEvent`] emitted after this call.
    ///
    /// Each subscriber gets its own unbounded queue, so a large refresh
    /// never drops events for a slow reader. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<VatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Startup: augment the configured model and, when an invoicing
    /// collaborator is present, its invoice model, then register
    /// [`on_invoice`](Self::on_invoice) as an issuing hook.
    ///
    /// # Errors
    ///
    /// [`VatError::Schema`] if a model cannot be augmented.
    pub fn init_app<I: IssuingInvoice>(
        self: &Arc<Self>,
        schema: &dyn SchemaMigrator,
        invoicing: Option<&dyn Invoicing<I>>,
    ) -> Result<(), VatError> {
        self.ensure_model_fields(schema)?;
        if let Some(invoicing) = invoicing {
            self.attach_invoicing(schema, invoicing)?;
        }
        Ok(())
    }

    /// Add the VAT fields to the configured model, if any.
    pub fn ensure_model_fields(&self, schema: &dyn SchemaMigrator) -> Result<(), VatError> {
        if let Some(model) = self.settings().model.as_deref() {
            schema.ensure_fields(model, VAT_MODEL_FIELDS)?;
            debug!(model, "VAT fields ensured");
        }
        Ok(())
    }

    /// Add the invoice fields and register the issuing hook.
    pub fn attach_invoicing<I: IssuingInvoice>(
        self: &Arc<Self>,
        schema: &dyn SchemaMigrator,
        invoicing: &dyn Invoicing<I>,
    ) -> Result<(), VatError> {
        let model = invoicing.invoice_model();
        schema.ensure_fields(model, INVOICE_MODEL_FIELDS)?;
        invoicing.register_issuing_hook(Arc::clone(self) as Arc<dyn InvoiceIssuingHook<I>>);
        debug!(model, "invoice issuing hook registered");
        Ok(())
    }

    /// Charging rule for stored data: a stored VAT number is taken as
    /// already validated.
    pub fn should_charge_vat(&self, country_code: &str, vat_number: Option<&str>) -> bool {
        let has_number = vat_number.is_some_and(|n| !n.trim().is_empty());
        self.service.should_charge_vat(country_code, has_number)
    }

    /// Derived `should_charge_eu_vat` attribute of an augmented record.
    pub fn should_charge_record_vat(&self, record: &impl EuVatFields) -> bool {
        match record.eu_vat_country() {
            Some(country) => self.should_charge_vat(country, record.eu_vat_number()),
            None => false,
        }
    }

    /// Set the record's VAT country and cached rate, or clear both for
    /// countries outside the EU.
    ///
    /// # Errors
    ///
    /// Rate lookup errors; the record is left unchanged.
    pub async fn set_model_country(
        &self,
        record: &mut impl EuVatFields,
        country_code: &str,
    ) -> Result<(), VatError> {
        if is_eu_country(country_code) {
            let country = country_code.to_ascii_uppercase();
            let rate = self.service.get_vat_rate(&country, None).await?;
            record.set_eu_vat_country(Some(country));
            record.set_eu_vat_rate(rate);
        } else {
            record.set_eu_vat_country(None);
            record.set_eu_vat_rate(None);
        }
        Ok(())
    }

    /// Refresh every EU country's rate and update the stored rate of each
    /// record of the configured model that no longer matches.
    ///
    /// All updates are committed in one [`VatRecordStore::save_all`] call.
    /// Events are only sent once the commit succeeded: one
    /// [`VatEvent::ModelRateUpdated`] per record, then
    /// [`VatEvent::RatesUpdated`]. Returns the number of updated records.
    ///
    /// # Errors
    ///
    /// [`VatError::Config`] without a configured model; rate service and
    /// store errors abort the run with nothing persisted.
    pub async fn update_model_vat_rates(
        &self,
        store: &dyn VatRecordStore,
    ) -> Result<usize, VatError> {
        let model = self
            .settings()
            .model
            .clone()
            .ok_or_else(|| VatError::Config("no model configured for VAT fields".into()))?;

        let mut updated: Vec<VatRecord> = Vec::new();
        for country in eu_countries() {
            let rate = self.service.refresh_vat_rate(country.code, None).await?;
            let stale = store
                .records_with_stale_rate(&model, country.code, rate)
                .await?;
            for mut record in stale {
                record.set_eu_vat_rate(rate);
                updated.push(record);
            }
        }

        store.save_all(&model, &updated).await?;

        for record in &updated {
            self.emit(VatEvent::ModelRateUpdated {
                model: model.clone(),
                record_id: record.id,
                country: record.eu_vat_country.clone().unwrap_or_default(),
                rate: record.eu_vat_rate,
            });
        }
        self.emit(VatEvent::RatesUpdated {
            updated: updated.len(),
        });
        info!(model = %model, updated = updated.len(), "VAT rates refreshed");
        Ok(updated.len())
    }

    fn emit(&self, event: VatEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Invoice issuing hook.
    ///
    /// Never fails: an exchange rate error is logged and leaves the rate
    /// and converted amount empty.
    pub async fn on_invoice<I: IssuingInvoice>(&self, invoice: &mut I) {
        if !is_eu_country(invoice.country()) {
            invoice.eu_vat_fields_mut().is_eu_country = false;
            return;
        }

        let country = invoice.country().to_string();
        let currency = invoice.currency().map(str::to_string);
        let tax_amount = invoice.tax_amount().filter(|t| !t.is_zero());
        let vat_number = invoice
            .customer_vat_number()
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let fields = invoice.eu_vat_fields_mut();
        fields.is_eu_country = true;
        fields.eu_vat_number = vat_number.clone();

        let rate = self
            .service
            .get_exchange_rate(&country, currency.as_deref())
            .await;
        let fields = invoice.eu_vat_fields_mut();
        match rate {
            Ok(rate) => {
                fields.eu_exchange_rate = Some(rate);
                fields.eu_vat_amount = tax_amount
                    .and_then(|t| t.checked_mul(rate))
                    .map(|v| v.round_dp(2));
            }
            Err(e) => {
                error!(country = %country, error = %e, "exchange rate for invoice failed");
                fields.eu_exchange_rate = None;
                fields.eu_vat_amount = None;
            }
        }

        if let (Some(number), Some(template)) = (
            vat_number,
            self.settings().invoice_customer_mention_message.as_deref(),
        ) {
            invoice.set_customer_special_mention(render_mention(template, &number));
        }
    }
}

#[async_trait]
impl<I: IssuingInvoice> InvoiceIssuingHook<I> for EuVatFeature {
    async fn before_issue(&self, invoice: &mut I) {
        self.on_invoice(invoice).await;
    }
}
