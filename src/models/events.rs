//! Outbound events delivered to the host
//!
//! Every event carries the `mapId` of its session; payload fields are merged
//! alongside it when the event is rendered to JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use super::geometry::{LatLng, LatLngBounds};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EventName {
    OnMapReady,
    OnMapClick,
    OnMapLongClick,
    OnMapLoaded,
    OnMarkerClick,
    OnMarkerDragStart,
    OnMarkerDrag,
    OnMarkerDragEnd,
    OnInfoWindowClick,
    OnPolygonClick,
    OnPolylineClick,
    OnCircleClick,
    OnCameraIdle,
    OnCameraMoveStarted,
    OnBoundsChanged,
    OnZoomChanged,
    OnMyLocationButtonClick,
    OnMyLocationClick,
    OnClusterClick,
    OnClusterInfoWindowClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<LatLng> for PointPayload {
    fn from(point: LatLng) -> Self {
        Self {
            latitude: point.lat,
            longitude: point.lng,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerPayload {
    pub marker_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonPayload {
    pub polygon_id: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylinePayload {
    pub polyline_id: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CirclePayload {
    pub circle_id: String,
    pub tag: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

/// Bounds rendered with their center, as hosts expect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsPayload {
    pub southwest: LatLng,
    pub center: LatLng,
    pub northeast: LatLng,
}

impl From<LatLngBounds> for BoundsPayload {
    fn from(bounds: LatLngBounds) -> Self {
        Self {
            southwest: bounds.southwest,
            center: bounds.center(),
            northeast: bounds.northeast,
        }
    }
}

/// Shared by `onCameraIdle` and `onBoundsChanged`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIdlePayload {
    pub bounds: Option<BoundsPayload>,
    pub bearing: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub tilt: f64,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraMoveStartedPayload {
    pub is_gesture: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomChangedPayload {
    pub zoom_level: f64,
}

/// Cluster centroid, member count and flattened member summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub size: usize,
    pub items: Vec<MarkerPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Marker(MarkerPayload),
    Polygon(PolygonPayload),
    Polyline(PolylinePayload),
    Circle(CirclePayload),
    Cluster(ClusterPayload),
    CameraIdle(CameraIdlePayload),
    CameraMoveStarted(CameraMoveStartedPayload),
    ZoomChanged(ZoomChangedPayload),
    Point(PointPayload),
    Empty {},
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEvent {
    pub name: EventName,
    pub map_id: String,
    pub payload: EventPayload,
}

impl MapEvent {
    pub fn new<S: Into<String>>(name: EventName, map_id: S, payload: EventPayload) -> Self {
        Self {
            name,
            map_id: map_id.into(),
            payload,
        }
    }

    pub fn bare<S: Into<String>>(name: EventName, map_id: S) -> Self {
        Self::new(name, map_id, EventPayload::Empty {})
    }

    /// Payload object with `mapId` merged in
    pub fn data(&self) -> Value {
        let mut data = match serde_json::to_value(&self.payload) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        data.insert("mapId".to_string(), Value::String(self.map_id.clone()));
        Value::Object(data)
    }

    /// `{ "event": name, "data": {...} }` envelope used by the CLI and hosts that multiplex
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "event": self.name.as_ref(),
            "data": self.data(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_match_host_contract() {
        assert_eq!(EventName::OnMapReady.to_string(), "onMapReady");
        assert_eq!(EventName::OnClusterInfoWindowClick.as_ref(), "onClusterInfoWindowClick");
        assert_eq!(
            serde_json::to_value(EventName::OnMyLocationButtonClick).unwrap(),
            "onMyLocationButtonClick"
        );
    }

    #[test]
    fn test_data_merges_map_id() {
        let event = MapEvent::new(
            EventName::OnMarkerClick,
            "map-1",
            EventPayload::Marker(MarkerPayload {
                marker_id: "m7".to_string(),
                latitude: 1.0,
                longitude: 2.0,
                title: Some("Pier".to_string()),
                snippet: None,
            }),
        );
        let data = event.data();
        assert_eq!(data["mapId"], "map-1");
        assert_eq!(data["markerId"], "m7");
        assert_eq!(data["title"], "Pier");
        assert!(data["snippet"].is_null());
    }

    #[test]
    fn test_bare_event_has_only_map_id() {
        let json = MapEvent::bare(EventName::OnMapLoaded, "map-2").to_json();
        assert_eq!(json["event"], "onMapLoaded");
        assert_eq!(json["data"], serde_json::json!({ "mapId": "map-2" }));
    }

    #[test]
    fn test_bounds_payload_includes_center() {
        let payload = BoundsPayload::from(LatLngBounds::new(
            LatLng::new(0.0, 0.0),
            LatLng::new(2.0, 4.0),
        ));
        assert_eq!(payload.center, LatLng::new(1.0, 2.0));
    }
}
