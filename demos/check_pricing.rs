use euvat::core::*;
use rust_decimal_macros::dec;

fn main() {
    // Country table (no network required)
    println!("=== EU Countries ===\n");

    for code in ["FR", "de", "HR", "GB", "CH", "US"] {
        match EuCountry::parse(code) {
            Ok(country) => println!("  {code} => EU, currency {}", country.currency),
            Err(e) => println!("  {code} => {e}"),
        }
    }

    // Charging rule for a seller based in Germany
    println!("\n=== Should Charge VAT (seller in DE) ===\n");

    let buyers = [
        ("French consumer", "FR", false),
        ("French business, valid number", "FR", true),
        ("German business, valid number", "DE", true),
        ("Swiss business", "CH", false),
    ];

    for (label, country, valid) in &buyers {
        let charge = should_charge_vat(country, Some("DE"), *valid);
        println!("  {label}: charge={charge}");
    }

    // Amounts with a 20% rate, invoiced in SEK
    println!("\n=== Amounts (20% VAT, EUR -> SEK @ 11.2805) ===\n");

    for (label, charge) in [("charged", true), ("reverse charge", false)] {
        match compute_amounts(dec!(99.99), Some(dec!(20)), charge, dec!(11.2805)) {
            Ok(a) => println!(
                "  {label}: net={} vat={} gross={} gross_sek={}",
                a.amount, a.vat_amount, a.amount_with_vat, a.exchanged_amount_with_vat
            ),
            Err(e) => println!("  {label}: {e}"),
        }
    }

    // Invoice mention
    println!(
        "\n  Mention: {}",
        render_mention(DEFAULT_MENTION, "FR40303265045")
    );
}
