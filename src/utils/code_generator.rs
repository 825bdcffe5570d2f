use rand::Rng;

/// Crockford base32, no I/L/O/U so codes survive being read aloud
const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// 20 random symbols, 100 bits of entropy
const CODE_BODY_LEN: usize = 20;

fn random_symbols(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Unguessable redemption code, e.g. `EVT-7Q2K...`
pub fn generate_redemption_code(prefix: &str) -> String {
    format!("{prefix}-{}", random_symbols(CODE_BODY_LEN))
}

/// Human-facing reference for gateway charges
pub fn generate_reference_number(prefix: &str) -> String {
    let date = chrono::Utc::now().format("%Y%m%d");
    format!("{prefix}{date}{}", random_symbols(8))
}

/// Payload encoded into the QR image: `<kind>:<code>`
pub fn qr_payload(kind: &str, code: &str) -> String {
    format!("{kind}:{code}")
}

/// Accepts a raw code or a scanned payload and returns the code part.
pub fn parse_qr_input(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    let code = match trimmed.split_once(':') {
        Some((_, code)) => code.trim(),
        None => trimmed,
    };
    if code.is_empty() { None } else { Some(code) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_redemption_code_shape() {
        let code = generate_redemption_code("EVT");
        let (prefix, body) = code.split_once('-').unwrap();
        assert_eq!(prefix, "EVT");
        assert_eq!(body.len(), CODE_BODY_LEN);
        assert!(body.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_codes_do_not_repeat() {
        let codes: HashSet<String> = (0..1000).map(|_| generate_redemption_code("MEAL")).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_reference_number_is_dated() {
        let reference = generate_reference_number("TOP");
        let today = chrono::Utc::now().format("%Y%m%d").to_string();
        assert!(reference.starts_with(&format!("TOP{today}")));
        assert_eq!(reference.len(), 3 + 8 + 8);
    }

    #[test]
    fn test_qr_input_accepts_payload_or_raw_code() {
        let payload = qr_payload("event_registration", "EVT-ABC");
        assert_eq!(parse_qr_input(&payload), Some("EVT-ABC"));
        assert_eq!(parse_qr_input("  EVT-ABC "), Some("EVT-ABC"));
        assert_eq!(parse_qr_input("meal_reservation:"), None);
        assert_eq!(parse_qr_input(""), None);
    }
}
