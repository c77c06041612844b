// Formatting helpers shared by the engine and any display layer.
use chrono::{DateTime, Local, Utc};

/// Local wall-clock label (HH:MM:SS) used for candle and trade timestamps.
pub fn time_label(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Decimal places used when showing prices for an instrument.
pub fn price_precision(instrument_id: &str) -> usize {
    if instrument_id.contains("JPY") {
        3
    } else if instrument_id.contains("BTC") || instrument_id.contains("ETH") {
        2
    } else {
        5
    }
}

pub fn format_price(price: f64, precision: usize) -> String {
    format!("{:.*}", precision, price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_price_precision() {
        assert_eq!(price_precision("USDJPY"), 3);
        assert_eq!(price_precision("BTCUSD"), 2);
        assert_eq!(price_precision("ETHUSD"), 2);
        assert_eq!(price_precision("EURUSD"), 5);
        assert_eq!(price_precision("XAUUSD"), 5);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1.085423, 5), "1.08542");
        assert_eq!(format_price(67250.0, 2), "67250.00");
    }

    #[test]
    fn test_time_label_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let label = time_label(ts);
        assert_eq!(label.len(), 8);
        assert_eq!(label.chars().filter(|c| *c == ':').count(), 2);
        assert!(label.ends_with(":05"));
    }
}
