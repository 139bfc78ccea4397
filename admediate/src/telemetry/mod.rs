//! Telemetry pipeline.
//!
//! Components record events through a fire-and-forget [`TelemetryClient`];
//! a background [`TelemetryDaemon`] buffers, batches, compresses, and
//! delivers them. Telemetry loss is tolerated by design: delivery failures
//! are retried a bounded number of times and then counted and dropped,
//! never surfaced to the ad-serving path.

mod client;
mod daemon;
mod event;
mod redact;
mod transport;

pub use client::TelemetryClient;
pub use daemon::{
    encode_batch, SharedTelemetryStats, TelemetryConfig, TelemetryDaemon, TelemetryStats,
};
pub use event::{event_types, TelemetryEvent};
pub use redact::{redact, redact_value, EMAIL_TOKEN, HEX_ID_TOKEN, PHONE_TOKEN};
pub use transport::{HttpTelemetryTransport, TelemetryTransport, TransportError};

#[cfg(test)]
pub use transport::tests::MockTransport;
