//! Static currency exchange table
//!
//! Rates are fixed reference values, not market data. Lookups are
//! case-insensitive on the currency code.

use std::collections::BTreeMap;

/// (from, [(to, rate)]) pairs
const RATES: &[(&str, &[(&str, f64)])] = &[
    ("BSV", &[("USD", 50.0), ("EUR", 45.0), ("BTC", 0.0012), ("ETH", 0.023)]),
    ("BTC", &[("USD", 42000.0), ("EUR", 38000.0), ("BSV", 840.0), ("ETH", 19.0)]),
    ("ETH", &[("USD", 2200.0), ("EUR", 2000.0), ("BSV", 44.0), ("BTC", 0.052)]),
    ("USD", &[("BSV", 0.02), ("BTC", 0.000024), ("ETH", 0.00045)]),
    ("EUR", &[("BSV", 0.022), ("BTC", 0.000026), ("ETH", 0.0005)]),
];

/// Note attached to full-table responses
pub const RATES_NOTE: &str = "Static reference rates, not live market data.";

/// Rate converting one unit of `from` into `to`
pub fn rate(from: &str, to: &str) -> Option<f64> {
    let from = from.to_ascii_uppercase();
    let to = to.to_ascii_uppercase();

    RATES
        .iter()
        .find(|(code, _)| *code == from)
        .and_then(|(_, targets)| targets.iter().find(|(code, _)| *code == to))
        .map(|(_, rate)| *rate)
}

/// The whole table, keyed by source then target currency
pub fn all_rates() -> BTreeMap<&'static str, BTreeMap<&'static str, f64>> {
    RATES
        .iter()
        .map(|(from, targets)| (*from, targets.iter().copied().collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(rate("usd", "bsv"), Some(0.02));
        assert_eq!(rate("BSV", "USD"), Some(50.0));
    }

    #[test]
    fn test_unknown_pairs() {
        assert_eq!(rate("USD", "EUR"), None);
        assert_eq!(rate("DOGE", "USD"), None);
        assert_eq!(rate("USD", "USD"), None);
    }

    #[test]
    fn test_table_shape() {
        let table = all_rates();
        assert_eq!(table.len(), 5);
        assert_eq!(table["BTC"]["BSV"], 840.0);
    }
}
