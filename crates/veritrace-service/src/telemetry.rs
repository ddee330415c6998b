//! # Telemetry Ingest Types
//!
//! Sensor events arrive from external devices with arbitrary timezone
//! offsets and device-specific measurement payloads. The event type keeps
//! the raw timestamp string; conversion to the UTC-only [`Timestamp`]
//! happens at ingest, where a bad timestamp can still be rejected with the
//! event's identity attached.
//!
//! [`Timestamp`]: veritrace_core::Timestamp

use serde::{Deserialize, Serialize};

use veritrace_core::{DeviceId, ProductId};

/// One sensor reading tied to a tracked product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// The product the reading is about.
    pub product_id: ProductId,
    /// The reporting device.
    pub device_id: DeviceId,
    /// When the reading was taken, RFC 3339 with any offset.
    pub recorded_at: String,
    /// Device-specific measurements, e.g. `{"temperatureC": 4.2}`.
    pub measurements: serde_json::Value,
    /// Where the reading was taken.
    pub location: String,
}

/// Receives every successfully ingested telemetry event.
///
/// The service calls this after the event is durably recorded; a sink must
/// never fail ingestion, so the interface is infallible and implementations
/// swallow their own errors.
pub trait AnalyticsSink: Send + Sync {
    /// Observe one ingested event.
    fn observe(&self, event: &TelemetryEvent);
}

/// Sink that drops every event. The default when no analytics pipeline is
/// attached.
#[derive(Debug, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn observe(&self, _event: &TelemetryEvent) {}
}
