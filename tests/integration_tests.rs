#![cfg(feature = "integration")]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use euvat::core::*;
use euvat::integration::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc::error::TryRecvError;

#[derive(Debug, Default)]
struct Invoice {
    country: String,
    currency: Option<String>,
    tax_amount: Option<Decimal>,
    customer_vat_number: Option<String>,
    eu: InvoiceVatFields,
    customer_special_mention: Option<String>,
}

impl Invoice {
    fn to(country: &str) -> Self {
        Self {
            country: country.into(),
            ..Self::default()
        }
    }
}

impl IssuingInvoice for Invoice {
    fn country(&self) -> &str {
        &self.country
    }

    fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    fn tax_amount(&self) -> Option<Decimal> {
        self.tax_amount
    }

    fn customer_vat_number(&self) -> Option<&str> {
        self.customer_vat_number.as_deref()
    }

    fn eu_vat_fields_mut(&mut self) -> &mut InvoiceVatFields {
        &mut self.eu
    }

    fn set_customer_special_mention(&mut self, mention: String) {
        self.customer_special_mention = Some(mention);
    }
}

fn feature_with(settings: Settings) -> (Arc<EuVatFeature>, Arc<Fixture>) {
    let (svc, fixture, _) = service_with(settings);
    (Arc::new(EuVatFeature::new(Arc::new(svc))), fixture)
}

fn customer_feature() -> (Arc<EuVatFeature>, Arc<Fixture>) {
    let mut settings = Settings::default().with_own_country("DE");
    settings.model = Some("Customer".into());
    feature_with(settings)
}

fn record(id: u64, country: &str, rate: Decimal) -> VatRecord {
    VatRecord {
        id,
        eu_vat_country: Some(country.into()),
        eu_vat_number: None,
        eu_vat_rate: Some(rate),
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[test]
fn init_app_augments_models_and_registers_hook() {
    let (feature, _) = customer_feature();
    let schema = MemorySchema::new();
    let invoicing = InvoiceHooks::<Invoice>::new("Invoice");

    feature
        .init_app(&schema, Some(&invoicing as &dyn Invoicing<Invoice>))
        .unwrap();

    for field in ["eu_vat_country", "eu_vat_number", "eu_vat_rate"] {
        assert!(schema.has_field("Customer", field), "{field}");
    }
    for field in ["is_eu_country", "eu_vat_number", "eu_exchange_rate", "eu_vat_amount"] {
        assert!(schema.has_field("Invoice", field), "{field}");
    }
    assert_eq!(invoicing.len(), 1);
}

#[test]
fn init_app_without_model_or_invoicing() {
    let (feature, _) = feature_with(Settings::default());
    let schema = MemorySchema::new();
    feature.init_app::<Invoice>(&schema, None).unwrap();
    assert!(schema.fields("Customer").is_empty());
    assert!(schema.fields("Invoice").is_empty());
}

#[test]
fn init_app_reports_schema_conflicts() {
    let (feature, _) = customer_feature();
    let schema = MemorySchema::new();
    schema
        .ensure_fields("Customer", &[FieldSpec::new("eu_vat_rate", FieldKind::Text)])
        .unwrap();
    assert!(matches!(
        feature.init_app::<Invoice>(&schema, None),
        Err(VatError::Schema(_))
    ));
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn set_model_country_for_eu_and_non_eu() {
    let (feature, _) = customer_feature();
    let mut customer = VatRecord::new(1);

    feature.set_model_country(&mut customer, "fr").await.unwrap();
    assert_eq!(customer.eu_vat_country.as_deref(), Some("FR"));
    assert_eq!(customer.eu_vat_rate, Some(dec!(20)));

    feature.set_model_country(&mut customer, "US").await.unwrap();
    assert!(customer.eu_vat_country.is_none());
    assert!(customer.eu_vat_rate.is_none());
}

#[tokio::test]
async fn set_model_country_keeps_record_on_rate_failure() {
    let (feature, _) = customer_feature();
    let mut customer = record(1, "FR", dec!(20));
    assert!(feature.set_model_country(&mut customer, "GB").await.is_err());
    assert_eq!(customer, record(1, "FR", dec!(20)));
}

#[test]
fn record_charging_rule() {
    let (feature, _) = customer_feature();
    let mut customer = record(1, "FR", dec!(20));
    assert!(feature.should_charge_record_vat(&customer));

    customer.eu_vat_number = Some("FR40303265045".into());
    assert!(!feature.should_charge_record_vat(&customer));

    customer.eu_vat_country = Some("DE".into());
    assert!(feature.should_charge_record_vat(&customer));

    customer.eu_vat_country = None;
    assert!(!feature.should_charge_record_vat(&customer));

    assert!(feature.should_charge_vat("IE", Some("  ")));
    assert!(!feature.should_charge_vat("CH", None));
}

// ---------------------------------------------------------------------------
// Rate refresh job
// ---------------------------------------------------------------------------

fn seeded_store() -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    store.insert("Customer", record(1, "FR", dec!(19.6))).unwrap();
    store.insert("Customer", record(2, "FR", dec!(20))).unwrap();
    store.insert("Customer", record(3, "DE", dec!(16))).unwrap();
    store.insert("Customer", VatRecord::new(4)).unwrap();
    store
}

#[tokio::test]
async fn refresh_updates_stale_records_and_emits_events() {
    let (feature, fixture) = customer_feature();
    fixture.heal_rate_service();
    let store = seeded_store();
    let mut events = feature.subscribe();

    let updated = feature.update_model_vat_rates(&store).await.unwrap();
    assert_eq!(updated, 2);
    assert_eq!(store.get("Customer", 1).unwrap().eu_vat_rate, Some(dec!(20)));
    assert_eq!(store.get("Customer", 3).unwrap().eu_vat_rate, Some(dec!(19)));
    assert_eq!(store.get("Customer", 4).unwrap(), VatRecord::new(4));

    let mut per_record = Vec::new();
    loop {
        match events.try_recv() {
            Ok(VatEvent::ModelRateUpdated { record_id, .. }) => per_record.push(record_id),
            Ok(VatEvent::RatesUpdated { updated }) => {
                assert_eq!(updated, 2);
                break;
            }
            Err(e) => panic!("missing RatesUpdated: {e:?}"),
        }
    }
    per_record.sort_unstable();
    assert_eq!(per_record, vec![1, 3]);
}

#[tokio::test]
async fn large_refresh_delivers_every_record_event() {
    let (feature, fixture) = customer_feature();
    fixture.heal_rate_service();
    let store = MemoryRecordStore::new();
    for id in 1..=100 {
        store.insert("Customer", record(id, "FR", dec!(19.6))).unwrap();
    }
    let mut early = feature.subscribe();
    let mut late = feature.subscribe();

    assert_eq!(feature.update_model_vat_rates(&store).await.unwrap(), 100);

    let mut per_record = Vec::new();
    while let Ok(event) = early.try_recv() {
        match event {
            VatEvent::ModelRateUpdated { record_id, rate, .. } => {
                assert_eq!(rate, Some(dec!(20)));
                per_record.push(record_id);
            }
            VatEvent::RatesUpdated { updated } => assert_eq!(updated, 100),
        }
    }
    assert_eq!(per_record, (1..=100).collect::<Vec<u64>>());

    let mut count = 0;
    while late.try_recv().is_ok() {
        count += 1;
    }
    assert_eq!(count, 101);
}

#[tokio::test]
async fn dropped_subscriber_does_not_block_others() {
    let (feature, fixture) = customer_feature();
    fixture.heal_rate_service();
    let store = seeded_store();
    drop(feature.subscribe());
    let mut events = feature.subscribe();

    feature.update_model_vat_rates(&store).await.unwrap();
    assert!(matches!(
        events.try_recv(),
        Ok(VatEvent::ModelRateUpdated { .. })
    ));
}

#[tokio::test]
async fn refresh_replaces_cached_rates() {
    let (feature, fixture) = customer_feature();
    fixture.heal_rate_service();
    let store = seeded_store();

    assert_eq!(feature.service().get_vat_rate("FR", None).await.unwrap(), Some(dec!(20)));
    fixture.set_standard("FR", dec!(21));
    feature.update_model_vat_rates(&store).await.unwrap();

    assert_eq!(feature.service().get_vat_rate("FR", None).await.unwrap(), Some(dec!(21)));
    assert_eq!(store.get("Customer", 2).unwrap().eu_vat_rate, Some(dec!(21)));
}

#[tokio::test]
async fn refresh_aborts_on_rate_fault() {
    let (feature, _) = customer_feature();
    let store = seeded_store();
    let mut events = feature.subscribe();

    let err = feature.update_model_vat_rates(&store).await.unwrap_err();
    assert!(matches!(err, VatError::RateService { ref country, .. } if country == "GB"));
    assert_eq!(store.get("Customer", 1).unwrap().eu_vat_rate, Some(dec!(19.6)));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

struct BrokenCommit(MemoryRecordStore);

#[async_trait]
impl VatRecordStore for BrokenCommit {
    async fn records_with_stale_rate(
        &self,
        model: &str,
        country: &str,
        rate: Option<Decimal>,
    ) -> Result<Vec<VatRecord>, VatError> {
        self.0.records_with_stale_rate(model, country, rate).await
    }

    async fn save_all(&self, _model: &str, _records: &[VatRecord]) -> Result<(), VatError> {
        Err(VatError::Store("deadlock detected".into()))
    }
}

#[tokio::test]
async fn refresh_commit_failure_persists_nothing() {
    let (feature, fixture) = customer_feature();
    fixture.heal_rate_service();
    let store = BrokenCommit(seeded_store());
    let mut events = feature.subscribe();

    assert!(matches!(
        feature.update_model_vat_rates(&store).await,
        Err(VatError::Store(_))
    ));
    assert_eq!(store.0.get("Customer", 1).unwrap().eu_vat_rate, Some(dec!(19.6)));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn refresh_requires_a_model() {
    let (feature, _) = feature_with(Settings::default());
    assert!(matches!(
        feature.update_model_vat_rates(&MemoryRecordStore::new()).await,
        Err(VatError::Config(_))
    ));
}

// ---------------------------------------------------------------------------
// Invoice hook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn eu_invoice_is_augmented() {
    let (feature, _) = customer_feature();
    let mut invoice = Invoice {
        currency: Some("USD".into()),
        tax_amount: Some(dec!(20)),
        customer_vat_number: Some("FR40303265045".into()),
        ..Invoice::to("FR")
    };

    feature.on_invoice(&mut invoice).await;

    assert!(invoice.eu.is_eu_country);
    assert_eq!(invoice.eu.eu_vat_number.as_deref(), Some("FR40303265045"));
    assert_eq!(invoice.eu.eu_exchange_rate, Some(dec!(0.91946)));
    // 20 * 0.91946 = 18.3892
    assert_eq!(invoice.eu.eu_vat_amount, Some(dec!(18.39)));
    assert_eq!(
        invoice.customer_special_mention.as_deref(),
        Some("VAT Number: FR40303265045")
    );
}

#[tokio::test]
async fn exchange_rate_failure_does_not_block_issuing() {
    let (feature, _) = customer_feature();
    let mut invoice = Invoice {
        currency: Some("JPY".into()),
        tax_amount: Some(dec!(20)),
        customer_vat_number: Some("DE123456789".into()),
        ..Invoice::to("DE")
    };

    feature.on_invoice(&mut invoice).await;

    assert!(invoice.eu.is_eu_country);
    assert!(invoice.eu.eu_exchange_rate.is_none());
    assert!(invoice.eu.eu_vat_amount.is_none());
    assert_eq!(
        invoice.customer_special_mention.as_deref(),
        Some("VAT Number: DE123456789")
    );
}

#[tokio::test]
async fn invoice_without_tax_or_number() {
    let (feature, _) = customer_feature();
    let mut invoice = Invoice::to("SE");

    feature.on_invoice(&mut invoice).await;

    assert!(invoice.eu.is_eu_country);
    assert_eq!(invoice.eu.eu_exchange_rate, Some(dec!(11.2345)));
    assert!(invoice.eu.eu_vat_amount.is_none());
    assert!(invoice.eu.eu_vat_number.is_none());
    assert!(invoice.customer_special_mention.is_none());
}

#[tokio::test]
async fn non_eu_invoice_is_only_marked() {
    let (feature, fixture) = customer_feature();
    let mut invoice = Invoice {
        customer_vat_number: Some("CHE123".into()),
        ..Invoice::to("CH")
    };
    invoice.eu.is_eu_country = true;

    feature.on_invoice(&mut invoice).await;

    assert!(!invoice.eu.is_eu_country);
    assert!(invoice.eu.eu_vat_number.is_none());
    assert!(invoice.customer_special_mention.is_none());
    assert_eq!(Fixture::calls(&fixture.fx_calls), 0);
}

#[tokio::test]
async fn mention_disabled_by_settings() {
    let mut settings = Settings::default();
    settings.invoice_customer_mention_message = None;
    let (feature, _) = feature_with(settings);
    let mut invoice = Invoice {
        customer_vat_number: Some("IE6388047V".into()),
        ..Invoice::to("IE")
    };

    feature.on_invoice(&mut invoice).await;

    assert_eq!(invoice.eu.eu_vat_number.as_deref(), Some("IE6388047V"));
    assert!(invoice.customer_special_mention.is_none());
}

#[tokio::test]
async fn registered_hook_runs_on_issue() {
    let (feature, _) = customer_feature();
    let schema = MemorySchema::new();
    let invoicing = InvoiceHooks::<Invoice>::new("Invoice");
    feature
        .init_app(&schema, Some(&invoicing as &dyn Invoicing<Invoice>))
        .unwrap();

    let mut invoice = Invoice {
        customer_vat_number: Some("IE6388047V".into()),
        ..Invoice::to("IE")
    };
    invoicing.run_issuing(&mut invoice).await;

    assert!(invoice.eu.is_eu_country);
    assert_eq!(invoice.eu.eu_exchange_rate, Some(Decimal::ONE));
    assert_eq!(
        invoice.customer_special_mention.as_deref(),
        Some("VAT Number: IE6388047V")
    );
}
