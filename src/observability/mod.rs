use std::sync::OnceLock;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing::info;

use crate::models::{EventName, OverlayKind};

/// Install a local SDK meter provider as the global provider
///
/// Without this the instruments in [`BridgeMetrics`] record into the no-op
/// provider, which is what library consumers and tests get by default.
pub fn init_metrics() -> SdkMeterProvider {
    let provider = SdkMeterProvider::builder().build();
    global::set_meter_provider(provider.clone());
    info!("OpenTelemetry configured: local metrics only");
    provider
}

/// Instruments shared by every session in the process
pub struct BridgeMetrics {
    pub overlays_added: Counter<u64>,
    pub overlays_removed: Counter<u64>,
    pub icon_cache_hits: Counter<u64>,
    pub icon_cache_misses: Counter<u64>,
    pub icon_cache_evictions: Counter<u64>,
    pub icon_decode_failures: Counter<u64>,
    pub reclusters: Counter<u64>,
    pub events_emitted: Counter<u64>,
    pub snapshot_duration: Histogram<f64>,
}

static METRICS: OnceLock<BridgeMetrics> = OnceLock::new();

impl BridgeMetrics {
    fn new() -> Self {
        let meter: Meter = global::meter("map-bridge");
        Self {
            overlays_added: meter
                .u64_counter("overlays_added_total")
                .with_description("Overlays attached to native maps")
                .build(),
            overlays_removed: meter
                .u64_counter("overlays_removed_total")
                .with_description("Overlays removed from native maps")
                .build(),
            icon_cache_hits: meter
                .u64_counter("icon_cache_hits_total")
                .with_description("Marker icons served from the cache")
                .build(),
            icon_cache_misses: meter
                .u64_counter("icon_cache_misses_total")
                .with_description("Marker icon cache lookups that missed")
                .build(),
            icon_cache_evictions: meter
                .u64_counter("icon_cache_evictions_total")
                .with_description("Icons evicted to stay within the byte budget")
                .build(),
            icon_decode_failures: meter
                .u64_counter("icon_decode_failures_total")
                .with_description("Inline icon payloads that could not be decoded")
                .build(),
            reclusters: meter
                .u64_counter("reclusters_total")
                .with_description("Clustering passes")
                .build(),
            events_emitted: meter
                .u64_counter("events_emitted_total")
                .with_description("Events delivered to the host")
                .build(),
            snapshot_duration: meter
                .f64_histogram("snapshot_duration_seconds")
                .with_description("Time from snapshot request to encoded image")
                .build(),
        }
    }

    /// Process-wide instruments, created on first use
    pub fn global() -> &'static BridgeMetrics {
        METRICS.get_or_init(BridgeMetrics::new)
    }

    pub fn record_overlays_added(&self, kind: OverlayKind, count: usize) {
        self.overlays_added
            .add(count as u64, &[KeyValue::new("kind", kind.to_string())]);
    }

    pub fn record_overlays_removed(&self, kind: OverlayKind, count: usize) {
        if count > 0 {
            self.overlays_removed
                .add(count as u64, &[KeyValue::new("kind", kind.to_string())]);
        }
    }

    pub fn record_icon_cache_hit(&self) {
        self.icon_cache_hits.add(1, &[]);
    }

    pub fn record_icon_cache_miss(&self) {
        self.icon_cache_misses.add(1, &[]);
    }

    pub fn record_icon_cache_eviction(&self) {
        self.icon_cache_evictions.add(1, &[]);
    }

    pub fn record_icon_decode_failure(&self) {
        self.icon_decode_failures.add(1, &[]);
    }

    pub fn record_recluster(&self) {
        self.reclusters.add(1, &[]);
    }

    pub fn record_event(&self, name: EventName) {
        self.events_emitted
            .add(1, &[KeyValue::new("event", name.as_ref().to_string())]);
    }

    pub fn record_snapshot(&self, seconds: f64, success: bool) {
        self.snapshot_duration
            .record(seconds, &[KeyValue::new("success", success)]);
    }
}
