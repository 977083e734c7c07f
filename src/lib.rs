//! # euvat
//!
//! EU VAT toolkit for web applications: VAT rate lookup per member state,
//! VAT number validation against VIES, ECB euro reference rates, and
//! VAT-inclusive pricing with the reverse-charge rule for cross-border B2B
//! buyers.
//!
//! All monetary values and rates use [`rust_decimal::Decimal`].
//!
//! ## Quick Start
//!
//! ```rust
//! use euvat::core::*;
//! use rust_decimal_macros::dec;
//!
//! // A French consumer buying from a German seller pays French VAT.
//! assert!(should_charge_vat("FR", Some("DE"), false));
//! // An Irish business with a validated VAT number does not.
//! assert!(!should_charge_vat("IE", Some("DE"), true));
//!
//! let amounts = compute_amounts(dec!(100), Some(dec!(20)), true, dec!(1)).unwrap();
//! assert_eq!(amounts.vat_amount, dec!(20));
//! assert_eq!(amounts.amount_with_vat, dec!(120));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` | Country table, pricing, caches, settings, [`core::VatService`] |
//! | `remote` | HTTP clients for the ECB feed, TIC and VIES |
//! | `integration` | Host lifecycle: schema fields, record rate refresh, invoice hook |
//! | `server` | axum routes under `/eu-vat` and the `euvat-server` binary |
//! | `all` | Everything (default) |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "remote")]
pub mod remote;

#[cfg(feature = "integration")]
pub mod integration;

#[cfg(feature = "server")]
pub mod server;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
