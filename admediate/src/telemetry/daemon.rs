//! Telemetry batching daemon.
//!
//! The [`TelemetryDaemon`] runs as an independent async task that:
//!
//! 1. Receives redacted events from the channel (sent by `TelemetryClient`)
//! 2. Buffers them until the batch threshold or the flush interval
//! 3. Serializes, gzip-compresses, and sends each batch
//! 4. Retains a failed batch for bounded retries, then drops it
//!
//! # Design Notes
//!
//! The daemon owns the pending buffer and is its only writer. Failure to
//! deliver telemetry is tolerated: a batch that exhausts its send attempts
//! is dropped and counted, and nothing upstream ever blocks on delivery.

use super::event::TelemetryEvent;
use super::transport::TelemetryTransport;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning for the telemetry pipeline.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Batch size threshold that triggers an immediate flush.
    pub batch_size: usize,
    /// Interval after which a partial batch is flushed anyway.
    pub flush_interval: Duration,
    /// Total send attempts per batch before it is dropped.
    pub max_send_attempts: u32,
    /// Cap on buffered events while a failed batch blocks the pipe;
    /// oldest events are dropped beyond this.
    pub max_buffered_events: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval: Duration::from_secs(30),
            max_send_attempts: 3,
            max_buffered_events: 1000,
        }
    }
}

/// Counters published by the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub events_recorded: u64,
    pub events_dropped: u64,
    pub batches_sent: u64,
    pub batches_dropped: u64,
    pub send_retries: u64,
}

/// Shared stats handle for read-only access.
pub type SharedTelemetryStats = Arc<RwLock<TelemetryStats>>;

/// A serialized batch awaiting a retry.
struct RetainedBatch {
    body: Vec<u8>,
    events: usize,
    attempts: u32,
}

/// The telemetry batching daemon.
pub struct TelemetryDaemon {
    rx: mpsc::UnboundedReceiver<TelemetryEvent>,
    transport: Arc<dyn TelemetryTransport>,
    config: TelemetryConfig,
    pending: Vec<TelemetryEvent>,
    retained: Option<RetainedBatch>,
    stats: TelemetryStats,
    shared_stats: SharedTelemetryStats,
}

impl TelemetryDaemon {
    /// Creates a daemon reading from `rx` and sending through `transport`.
    pub fn new(
        rx: mpsc::UnboundedReceiver<TelemetryEvent>,
        transport: Arc<dyn TelemetryTransport>,
        config: TelemetryConfig,
    ) -> Self {
        Self {
            rx,
            transport,
            config,
            pending: Vec::new(),
            retained: None,
            stats: TelemetryStats::default(),
            shared_stats: Arc::new(RwLock::new(TelemetryStats::default())),
        }
    }

    /// Returns a handle to the published counters.
    pub fn stats_handle(&self) -> SharedTelemetryStats {
        Arc::clone(&self.shared_stats)
    }

    /// Runs the daemon until shutdown is signaled.
    ///
    /// On shutdown the channel is drained and the residual buffer is
    /// flushed once.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("telemetry daemon starting");

        let mut flush_interval = tokio::time::interval(self.config.flush_interval);
        flush_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it.
        flush_interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("telemetry daemon shutting down");
                    break;
                }

                Some(event) = self.rx.recv() => {
                    self.buffer_event(event);
                    if self.pending.len() >= self.config.batch_size {
                        self.flush().await;
                    }
                    self.publish_stats();
                }

                _ = flush_interval.tick() => {
                    self.flush().await;
                    self.publish_stats();
                }
            }
        }

        // Drain anything already queued, then flush the residue.
        while let Ok(event) = self.rx.try_recv() {
            self.buffer_event(event);
        }
        self.flush().await;
        self.publish_stats();
        info!(
            batches_sent = self.stats.batches_sent,
            batches_dropped = self.stats.batches_dropped,
            "telemetry daemon stopped"
        );
    }

    fn buffer_event(&mut self, event: TelemetryEvent) {
        self.stats.events_recorded += 1;
        self.pending.push(event);

        // Bound memory while a failed batch clogs the retry slot.
        if self.pending.len() > self.config.max_buffered_events {
            let overflow = self.pending.len() - self.config.max_buffered_events;
            self.pending.drain(0..overflow);
            self.stats.events_dropped += overflow as u64;
        }
    }

    /// Sends the retained batch if one exists, otherwise packages the
    /// pending buffer. A flush trigger handles at most one batch.
    async fn flush(&mut self) {
        if let Some(mut retained) = self.retained.take() {
            retained.attempts += 1;
            self.stats.send_retries += 1;
            match self.transport.send(&retained.body).await {
                Ok(()) => {
                    self.stats.batches_sent += 1;
                    debug!(events = retained.events, "retained telemetry batch delivered");
                }
                Err(err) if retained.attempts < self.config.max_send_attempts => {
                    warn!(error = %err, attempts = retained.attempts, "telemetry retry failed");
                    self.retained = Some(retained);
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        events = retained.events,
                        "telemetry batch dropped after max attempts"
                    );
                    self.stats.batches_dropped += 1;
                }
            }
            return;
        }

        if self.pending.is_empty() {
            return;
        }

        let events = std::mem::take(&mut self.pending);
        let count = events.len();
        let body = match encode_batch(&events) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, events = count, "telemetry batch encode failed");
                self.stats.batches_dropped += 1;
                return;
            }
        };

        match self.transport.send(&body).await {
            Ok(()) => {
                self.stats.batches_sent += 1;
                debug!(events = count, bytes = body.len(), "telemetry batch delivered");
            }
            Err(err) => {
                warn!(error = %err, events = count, "telemetry send failed, retaining batch");
                self.retained = Some(RetainedBatch {
                    body,
                    events: count,
                    attempts: 1,
                });
            }
        }
    }

    fn publish_stats(&self) {
        if let Ok(mut guard) = self.shared_stats.write() {
            *guard = self.stats;
        }
    }
}

/// Serializes events as a JSON array and gzip-compresses the result.
pub fn encode_batch(events: &[TelemetryEvent]) -> Result<Vec<u8>, std::io::Error> {
    let json = serde_json::to_vec(events)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    encoder.finish()
}

impl std::fmt::Debug for TelemetryDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryDaemon")
            .field("pending", &self.pending.len())
            .field("retained", &self.retained.is_some())
            .field("batches_sent", &self.stats.batches_sent)
            .finish()
    }
}
