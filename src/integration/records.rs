use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::VatError;

/// VAT fields carried by a host record (customer, account, ...).
pub trait EuVatFields {
    fn eu_vat_country(&self) -> Option<&str>;
    fn eu_vat_number(&self) -> Option<&str>;
    fn eu_vat_rate(&self) -> Option<Decimal>;
    fn set_eu_vat_country(&mut self, country: Option<String>);
    fn set_eu_vat_rate(&mut self, rate: Option<Decimal>);
}

/// A stored record of the augmented model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatRecord {
    pub id: u64,
    pub eu_vat_country: Option<String>,
    pub eu_vat_number: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub eu_vat_rate: Option<Decimal>,
}

impl VatRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl EuVatFields for VatRecord {
    fn eu_vat_country(&self) -> Option<&str> {
        self.eu_vat_country.as_deref()
    }

    fn eu_vat_number(&self) -> Option<&str> {
        self.eu_vat_number.as_deref()
    }

    fn eu_vat_rate(&self) -> Option<Decimal> {
        self.eu_vat_rate
    }

    fn set_eu_vat_country(&mut self, country: Option<String>) {
        self.eu_vat_country = country;
    }

    fn set_eu_vat_rate(&mut self, rate: Option<Decimal>) {
        self.eu_vat_rate = rate;
    }
}

/// Persistence for records of the augmented model.
#[async_trait]
pub trait VatRecordStore: Send + Sync {
    /// Records of `model` whose country is `country` and whose stored rate
    /// differs from `rate`.
    async fn records_with_stale_rate(
        &self,
        model: &str,
        country: &str,
        rate: Option<Decimal>,
    ) -> Result<Vec<VatRecord>, VatError>;

    /// Persist all records in one transaction: either every record is
    /// written or none is.
    async fn save_all(&self, model: &str, records: &[VatRecord]) -> Result<(), VatError>;
}

/// In-memory [`VatRecordStore`] keyed by model name and record id.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    models: RwLock<BTreeMap<String, BTreeMap<u64, VatRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record outside any batch.
    pub fn insert(&self, model: &str, record: VatRecord) -> Result<(), VatError> {
        let mut models = self.models.write().map_err(|_| poisoned())?;
        models
            .entry(model.to_string())
            .or_default()
            .insert(record.id, record);
        Ok(())
    }

    pub fn get(&self, model: &str, id: u64) -> Option<VatRecord> {
        let models = self.models.read().ok()?;
        models.get(model)?.get(&id).cloned()
    }
}

fn poisoned() -> VatError {
    VatError::Store("record store lock poisoned".into())
}

#[async_trait]
impl VatRecordStore for MemoryRecordStore {
    async fn records_with_stale_rate(
        &self,
        model: &str,
        country: &str,
        rate: Option<Decimal>,
    ) -> Result<Vec<VatRecord>, VatError> {
        let models = self.models.read().map_err(|_| poisoned())?;
        Ok(models
            .get(model)
            .into_iter()
            .flat_map(|records| records.values())
            .filter(|r| r.eu_vat_country.as_deref() == Some(country) && r.eu_vat_rate != rate)
            .cloned()
            .collect())
    }

    async fn save_all(&self, model: &str, records: &[VatRecord]) -> Result<(), VatError> {
        let mut models = self.models.write().map_err(|_| poisoned())?;
        let table = models
            .get_mut(model)
            .ok_or_else(|| VatError::Store(format!("unknown model {model}")))?;
        if let Some(missing) = records.iter().find(|r| !table.contains_key(&r.id)) {
            return Err(VatError::Store(format!(
                "{model} record {} does not exist",
                missing.id
            )));
        }
        for record in records {
            table.insert(record.id, record.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(id: u64, country: &str, rate: Option<Decimal>) -> VatRecord {
        VatRecord {
            id,
            eu_vat_country: Some(country.into()),
            eu_vat_number: None,
            eu_vat_rate: rate,
        }
    }

    #[tokio::test]
    async fn finds_stale_records_only() {
        let store = MemoryRecordStore::new();
        store.insert("Customer", record(1, "FR", Some(dec!(19.6)))).unwrap();
        store.insert("Customer", record(2, "FR", Some(dec!(20)))).unwrap();
        store.insert("Customer", record(3, "DE", Some(dec!(16)))).unwrap();
        store.insert("Customer", record(4, "FR", None)).unwrap();

        let stale = store
            .records_with_stale_rate("Customer", "FR", Some(dec!(20)))
            .await
            .unwrap();
        let ids: Vec<u64> = stale.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert!(
            store
                .records_with_stale_rate("Other", "FR", None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn save_all_is_all_or_nothing() {
        let store = MemoryRecordStore::new();
        store.insert("Customer", record(1, "FR", Some(dec!(19.6)))).unwrap();

        let batch = vec![record(1, "FR", Some(dec!(20))), record(99, "FR", Some(dec!(20)))];
        let err = store.save_all("Customer", &batch).await.unwrap_err();
        assert!(matches!(err, VatError::Store(_)));
        assert_eq!(store.get("Customer", 1).unwrap().eu_vat_rate, Some(dec!(19.6)));

        store.save_all("Customer", &batch[..1]).await.unwrap();
        assert_eq!(store.get("Customer", 1).unwrap().eu_vat_rate, Some(dec!(20)));
    }

    #[test]
    fn record_json_uses_numbers() {
        let r = record(7, "IE", Some(dec!(23)));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["eu_vat_rate"], serde_json::json!(23.0));
        assert_eq!(json["eu_vat_country"], "IE");
    }
}
