use chrono::NaiveTime;

/// `1250, "USD"` -> `12.50 USD`
pub fn format_amount(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02} {currency}", abs / 100, abs % 100)
}

/// Accepts `HH:MM` or `HH:MM:SS`
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1250, "USD"), "12.50 USD");
        assert_eq!(format_amount(5, "USD"), "0.05 USD");
        assert_eq!(format_amount(-2500, "USD"), "-25.00 USD");
        assert_eq!(format_amount(0, "EUR"), "0.00 EUR");
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time(" 14:05:00 "), NaiveTime::from_hms_opt(14, 5, 0));
        assert!(parse_time("25:00").is_none());
        assert!(parse_time("nine").is_none());
    }
}
