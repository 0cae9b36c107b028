#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgba, RgbaImage};
use tokio::sync::broadcast;

use map_bridge::config::Config;
use map_bridge::models::{EventName, FrameRect, LatLng, MapConfig, MapEvent, Marker};
use map_bridge::native::{ReadyBehaviour, SimulatedBackend, SimulatedProbe, SnapshotBehaviour};
use map_bridge::services::BroadcastNotifier;
use map_bridge::session::{MapManager, MapSessionHandle};

pub struct Harness {
    pub manager: MapManager,
    pub backend: SimulatedBackend,
    pub events: broadcast::Receiver<MapEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(SimulatedBackend::new(), Config::default())
    }

    pub fn with_backend(backend: SimulatedBackend, config: Config) -> Self {
        let notifier = BroadcastNotifier::new();
        let events = notifier.subscribe();
        let manager = MapManager::new(Arc::new(backend.clone()), Arc::new(notifier), config);
        Self {
            manager,
            backend,
            events,
        }
    }

    pub fn manual_ready() -> Self {
        Self::with_backend(
            SimulatedBackend::new().with_ready(ReadyBehaviour::Manual),
            Config::default(),
        )
    }

    pub fn with_snapshot(snapshot: SnapshotBehaviour) -> Self {
        Self::with_backend(
            SimulatedBackend::new().with_snapshot(snapshot),
            Config::default(),
        )
    }

    /// Create a ready map and return its handle with a probe onto the simulated view
    pub async fn map(&self, map_id: &str) -> (MapSessionHandle, SimulatedProbe) {
        let handle = self
            .manager
            .create_map(Some(map_id.to_string()), map_config())
            .await
            .unwrap();
        let probe = self.backend.probe(map_id).unwrap();
        (handle, probe)
    }

    /// Everything delivered so far, after giving the actors a moment to run
    pub async fn drain_events(&mut self) -> Vec<MapEvent> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn map_config() -> MapConfig {
    MapConfig::new(
        FrameRect {
            x: 0.0,
            y: 0.0,
            width: 400.0,
            height: 300.0,
        },
        LatLng::new(51.5, -0.12),
        5.0,
    )
}

pub fn marker(lat: f64, lng: f64) -> Marker {
    Marker::at(LatLng::new(lat, lng))
}

/// Markers close enough to cluster at zoom 5
pub fn nearby_markers(count: usize) -> Vec<Marker> {
    (0..count)
        .map(|i| marker(51.5 + i as f64 * 0.001, -0.12).with_title(format!("near {i}")))
        .collect()
}

pub fn png_data_url(width: u32, height: u32) -> String {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

pub fn names(events: &[MapEvent]) -> Vec<EventName> {
    events.iter().map(|e| e.name).collect()
}
