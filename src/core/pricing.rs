//! VAT charging policy and amount arithmetic.
//!
//! Everything here is pure; [`VatService`](super::VatService) feeds it
//! with rates looked up over the network.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::countries::is_eu_country;
use super::error::VatError;
use super::types::{AmountBreakdown, ExchangeRateSnapshot};

/// The euro, pivot currency of the ECB feed.
pub const EUR: &str = "EUR";

/// Decide whether VAT has to be charged to a buyer in `country`.
///
/// VAT is charged to EU buyers in the seller's own country, and to any EU
/// buyer without a validated VAT number. Buyers in another member state with
/// a valid number are exempt (reverse charge).
pub fn should_charge_vat(
    country: &str,
    own_country: Option<&str>,
    has_valid_vat_number: bool,
) -> bool {
    if !is_eu_country(country) {
        return false;
    }
    let same_country = own_country.is_some_and(|own| own.eq_ignore_ascii_case(country));
    same_country || !has_valid_vat_number
}

/// Compute VAT and gross amounts for `amount`.
///
/// `vat_rate` is a percentage. When `charge_vat` is false the rate is zero
/// and `vat_rate` is ignored.
///
/// # Errors
///
/// Returns [`VatError::RateUnavailable`] when VAT has to be charged but no
/// rate is known. The error carries empty country/rate-type fields; the
/// service fills them in. Returns [`VatError::AmountOutOfRange`] when an
/// intermediate result does not fit in a `Decimal`.
pub fn compute_amounts(
    amount: Decimal,
    vat_rate: Option<Decimal>,
    charge_vat: bool,
    exchange_rate: Decimal,
) -> Result<AmountBreakdown, VatError> {
    let rate = if charge_vat {
        vat_rate.ok_or_else(|| VatError::RateUnavailable {
            country: String::new(),
            rate_type: String::new(),
        })? / dec!(100)
    } else {
        Decimal::ZERO
    };

    let out_of_range = || VatError::AmountOutOfRange(amount.to_string());
    let vat = amount.checked_mul(rate).ok_or_else(out_of_range)?;
    let amount_with_vat = amount.checked_add(vat).ok_or_else(out_of_range)?;
    let exchanged = amount_with_vat
        .checked_mul(exchange_rate)
        .ok_or_else(out_of_range)?;
    Ok(AmountBreakdown {
        amount,
        vat_amount: vat.round_dp(2),
        amount_with_vat,
        exchanged_amount_with_vat: exchanged.round_dp(2),
    })
}

/// Exchange rate converting `src` amounts into `dest`, pivoting on EUR.
///
/// - `src == dest` → exactly 1
/// - `src == EUR` → the destination rate as published
/// - otherwise → `dest / src`, rounded to 5 decimal places
///
/// # Errors
///
/// [`VatError::UnsupportedCurrency`] if `src` is not in the snapshot,
/// [`VatError::ExchangeRateUnavailable`] if `dest` is not.
pub fn cross_rate(
    snapshot: &ExchangeRateSnapshot,
    dest: &str,
    src: &str,
) -> Result<Decimal, VatError> {
    if src == dest {
        return Ok(Decimal::ONE);
    }
    let dest_rate = || {
        snapshot
            .rate(dest)
            .ok_or_else(|| VatError::ExchangeRateUnavailable(dest.to_string()))
    };
    if src == EUR {
        return dest_rate();
    }
    let src_rate = snapshot
        .rate(src)
        .filter(|r| !r.is_zero())
        .ok_or_else(|| VatError::UnsupportedCurrency(src.to_string()))?;
    Ok((dest_rate()? / src_rate).round_dp(5))
}

/// Render the customer-facing mention for a VAT number.
///
/// `{number}` in the template is replaced by the VAT number.
pub fn render_mention(template: &str, vat_number: &str) -> String {
    template.replace("{number}", vat_number)
}
