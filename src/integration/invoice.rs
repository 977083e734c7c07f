use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// EU fields stored on an issued invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceVatFields {
    pub is_eu_country: bool,
    pub eu_vat_number: Option<String>,
    /// Rate from the invoice currency into the buyer country's currency.
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub eu_exchange_rate: Option<Decimal>,
    /// Tax amount converted with `eu_exchange_rate`.
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub eu_vat_amount: Option<Decimal>,
}

/// An invoice in the middle of being issued, as seen by issuing hooks.
pub trait IssuingInvoice: Send + 'static {
    /// Buyer country code.
    fn country(&self) -> &str;
    /// Invoice currency; `None` means EUR.
    fn currency(&self) -> Option<&str>;
    fn tax_amount(&self) -> Option<Decimal>;
    fn customer_vat_number(&self) -> Option<&str>;
    fn eu_vat_fields_mut(&mut self) -> &mut InvoiceVatFields;
    fn set_customer_special_mention(&mut self, mention: String);
}

/// Callback run before an invoice is issued.
///
/// Hooks cannot veto issuance; they only augment the invoice.
#[async_trait]
pub trait InvoiceIssuingHook<I: IssuingInvoice>: Send + Sync {
    async fn before_issue(&self, invoice: &mut I);
}

/// The invoicing collaborator: owns the invoice model and its issuing hooks.
pub trait Invoicing<I: IssuingInvoice>: Send + Sync {
    /// Name of the invoice model, for schema augmentation.
    fn invoice_model(&self) -> &str;
    fn register_issuing_hook(&self, hook: Arc<dyn InvoiceIssuingHook<I>>);
}

/// Ordered list of issuing hooks for one invoice model.
pub struct InvoiceHooks<I: IssuingInvoice> {
    model: String,
    hooks: RwLock<Vec<Arc<dyn InvoiceIssuingHook<I>>>>,
}

impl<I: IssuingInvoice> InvoiceHooks<I> {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            hooks: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered hook, in registration order.
    pub async fn run_issuing(&self, invoice: &mut I) {
        let hooks: Vec<_> = match self.hooks.read() {
            Ok(hooks) => hooks.clone(),
            Err(_) => return,
        };
        for hook in hooks {
            hook.before_issue(invoice).await;
        }
    }
}

impl<I: IssuingInvoice> Invoicing<I> for InvoiceHooks<I> {
    fn invoice_model(&self) -> &str {
        &self.model
    }

    fn register_issuing_hook(&self, hook: Arc<dyn InvoiceIssuingHook<I>>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(hook);
        }
    }
}

impl<I: IssuingInvoice> std::fmt::Debug for InvoiceHooks<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceHooks")
            .field("model", &self.model)
            .field("hooks", &self.len())
            .finish()
    }
}
