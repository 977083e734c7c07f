//! Host application integration.
//!
//! [`EuVatFeature`] is mounted once at startup with a [`SchemaMigrator`] for
//! the host's data models and, optionally, an [`Invoicing`] collaborator. It
//! then keeps stored VAT rates current ([`EuVatFeature::update_model_vat_rates`])
//! and augments invoices as they are issued ([`EuVatFeature::on_invoice`]).

mod events;
mod feature;
mod invoice;
mod records;
mod schema;

pub use events::*;
pub use feature::*;
pub use invoice::*;
pub use records::*;
pub use schema::*;
