//! Best-effort PII redaction.
//!
//! A pure string transform that replaces recognizable email addresses,
//! phone-number patterns, and long hexadecimal identifiers with fixed
//! placeholder tokens. The patterns are heuristic: they can both over- and
//! under-redact, and are not an exhaustive PII detector. Events are passed
//! through here before they are buffered, so raw values never sit in
//! memory.

use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder for redacted email addresses.
pub const EMAIL_TOKEN: &str = "[redacted:email]";
/// Placeholder for redacted phone numbers.
pub const PHONE_TOKEN: &str = "[redacted:phone]";
/// Placeholder for redacted long hexadecimal identifiers.
pub const HEX_ID_TOKEN: &str = "[redacted:id]";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

// 16+ hex chars covers device ids, hashes, and advertising identifiers
// with the separators stripped.
static HEX_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9a-fA-F]{16,}\b").unwrap());

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?[0-9][0-9 ().\-]{6,}[0-9]").unwrap());

/// Replaces recognizable PII in a string with placeholder tokens.
pub fn redact(input: &str) -> String {
    let pass = EMAIL_RE.replace_all(input, EMAIL_TOKEN);
    let pass = HEX_ID_RE.replace_all(&pass, HEX_ID_TOKEN);
    let pass = PHONE_RE.replace_all(&pass, PHONE_TOKEN);
    pass.into_owned()
}

/// Redacts every string value in a JSON tree, in place.
pub fn redact_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            let redacted = redact(s);
            if redacted != *s {
                *s = redacted;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                redact_value(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                redact_value(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_email() {
        assert_eq!(
            redact("contact user.name+tag@example.co.uk for details"),
            format!("contact {} for details", EMAIL_TOKEN)
        );
    }

    #[test]
    fn test_redacts_phone_numbers() {
        assert_eq!(redact("call +1 (415) 555-2671 now"), format!("call {} now", PHONE_TOKEN));
        assert_eq!(redact("tel: 0171-555-0123"), format!("tel: {}", PHONE_TOKEN));
    }

    #[test]
    fn test_redacts_long_hex_ids() {
        assert_eq!(
            redact("device 3fa85f6457174562b3fc2c963f66afa6 seen"),
            format!("device {} seen", HEX_ID_TOKEN)
        );
    }

    #[test]
    fn test_short_hex_untouched() {
        // 8 hex chars is below the identifier threshold.
        assert_eq!(redact("color deadbeef"), "color deadbeef");
    }

    #[test]
    fn test_plain_text_untouched() {
        let input = "banner load for placement home took 42ms";
        assert_eq!(redact(input), input);
    }

    #[test]
    fn test_multiple_matches() {
        let out = redact("a@b.com then c@d.org");
        assert_eq!(out, format!("{} then {}", EMAIL_TOKEN, EMAIL_TOKEN));
    }

    #[test]
    fn test_redact_value_walks_json_tree() {
        let mut value = serde_json::json!({
            "user": "reach me at someone@example.com",
            "nested": { "ids": ["3fa85f6457174562b3fc2c963f66afa6"] },
            "count": 7
        });
        redact_value(&mut value);

        assert_eq!(
            value["user"],
            format!("reach me at {}", EMAIL_TOKEN)
        );
        assert_eq!(value["nested"]["ids"][0], HEX_ID_TOKEN);
        assert_eq!(value["count"], 7);
    }
}
