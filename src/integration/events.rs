use rust_decimal::Decimal;
use serde::Serialize;

/// Signals emitted by the rate refresh job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VatEvent {
    /// A record's stored rate was changed.
    ModelRateUpdated {
        model: String,
        record_id: u64,
        country: String,
        #[serde(with = "rust_decimal::serde::float_option")]
        rate: Option<Decimal>,
    },
    /// A refresh run committed; `updated` records changed.
    RatesUpdated { updated: usize },
}
