use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Serialize;

use crate::core::VatError;

/// Storage type of an augmented field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Decimal,
    Bool,
}

/// A field the VAT feature needs on a host model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Fields added to the configured customer/account model.
pub const VAT_MODEL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("eu_vat_country", FieldKind::Text),
    FieldSpec::new("eu_vat_number", FieldKind::Text),
    FieldSpec::new("eu_vat_rate", FieldKind::Decimal),
];

/// Fields added to the invoicing collaborator's invoice model.
pub const INVOICE_MODEL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("is_eu_country", FieldKind::Bool),
    FieldSpec::new("eu_vat_number", FieldKind::Text),
    FieldSpec::new("eu_exchange_rate", FieldKind::Decimal),
    FieldSpec::new("eu_vat_amount", FieldKind::Decimal),
];

/// Startup schema step: make sure a model carries the given fields.
///
/// Implementations must be idempotent. A field that already exists with the
/// same kind is left alone.
pub trait SchemaMigrator: Send + Sync {
    /// # Errors
    ///
    /// [`VatError::Schema`] if a field exists with a different kind or the
    /// backing store rejects the change.
    fn ensure_fields(&self, model: &str, fields: &[FieldSpec]) -> Result<(), VatError>;
}

/// In-memory schema registry.
#[derive(Debug, Default)]
pub struct MemorySchema {
    models: RwLock<BTreeMap<String, BTreeMap<&'static str, FieldKind>>>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields of `model`, sorted by name; empty if the model is unknown.
    pub fn fields(&self, model: &str) -> Vec<FieldSpec> {
        let Ok(models) = self.models.read() else {
            return Vec::new();
        };
        models
            .get(model)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, kind)| FieldSpec::new(*name, *kind))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_field(&self, model: &str, name: &str) -> bool {
        self.fields(model).iter().any(|f| f.name == name)
    }
}

impl SchemaMigrator for MemorySchema {
    fn ensure_fields(&self, model: &str, fields: &[FieldSpec]) -> Result<(), VatError> {
        let mut models = self
            .models
            .write()
            .map_err(|_| VatError::Schema("schema registry lock poisoned".into()))?;
        let existing = models.entry(model.to_string()).or_default();

        for field in fields {
            if let Some(kind) = existing.get(field.name) {
                if *kind != field.kind {
                    return Err(VatError::Schema(format!(
                        "{model}.{} exists as {kind:?}, expected {:?}",
                        field.name, field.kind
                    )));
                }
            }
        }
        for field in fields {
            existing.insert(field.name, field.kind);
        }
        Ok(())
    }
}
