//! Privacy and consent signal handling.
//!
//! Raw consent inputs (GDPR applicability, TCF string, US privacy string,
//! COPPA flag) are normalized into the outbound signal map every network
//! receives. Absent signals are omitted entirely; nothing is ever encoded
//! as null.

mod signals;
mod tcf;

pub use signals::{build_signals, ConsentCoordinator, ConsentState};
pub use tcf::{parse_tcf, TcfConsent};
