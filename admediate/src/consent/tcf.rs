//! Heuristic TCF consent-string inspection.
//!
//! This is a structural plausibility check, not a TCF binary decoder: it
//! verifies the segment separator and the base64url character set and
//! nothing more. The result is a non-authoritative "looks parsed" indicator
//! alongside the untouched raw string; networks receive the raw string
//! verbatim either way.

/// Result of a best-effort TCF string inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcfConsent {
    /// Whether the string is structurally plausible. Heuristic only.
    pub parsed: bool,
    /// Whether GDPR applies, as reported by the caller.
    pub gdpr_applies: bool,
    /// The original raw string, unchanged.
    pub raw: String,
}

fn is_base64url(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Performs a best-effort structural check on a raw TCF string.
///
/// Malformed input degrades to `parsed = false`; this never fails. A
/// plausible string has at least one `.` segment separator and every
/// segment drawn from the base64url alphabet.
pub fn parse_tcf(raw: &str, gdpr_applies: bool) -> TcfConsent {
    let parsed = raw.contains('.') && raw.split('.').all(is_base64url);

    TcfConsent {
        parsed,
        gdpr_applies,
        raw: raw.to_string(),
    }
}
