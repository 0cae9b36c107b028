use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::errors::{BridgeResult, MapError};

pub mod camera;
pub mod events;
pub mod geometry;
pub mod ground_overlay;
pub mod map_config;
pub mod marker;
pub mod shapes;

pub use camera::{CameraConfig, CameraPosition};
pub use events::{
    BoundsPayload, CameraIdlePayload, CameraMoveStartedPayload, CirclePayload, ClusterPayload,
    EventName, EventPayload, MapEvent, MarkerPayload, PointPayload, PolygonPayload,
    PolylinePayload, ZoomChangedPayload,
};
pub use geometry::{
    Color, FrameRect, LatLng, LatLngBounds, Padding, Point, ScreenRect, Size, scaled_pixels,
};
pub use ground_overlay::GroundOverlay;
pub use map_config::{MapConfig, MapType};
pub use marker::{Marker, TintColor};
pub use shapes::{Circle, Polygon, Polyline, StyleSpan};

/// The overlay entity kinds a session tracks, one registry each
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverlayKind {
    Marker,
    Polygon,
    Circle,
    Polyline,
    GroundOverlay,
}

/// Host-facing overlay description that can check its own geometry
pub trait Description: Clone + Send + Sync + 'static {
    const KIND: OverlayKind;

    fn validate(&self) -> BridgeResult<()>;
}

/// Deserialize a JSON argument object into `T`, mapping failures to `InvalidArguments`
pub fn from_args<T: DeserializeOwned>(args: &serde_json::Value) -> BridgeResult<T> {
    T::deserialize(args).map_err(|e| MapError::invalid_arguments(e.to_string()))
}

/// Image format accepted by `takeSnapshot`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_overlay_kind_names() {
        assert_eq!(OverlayKind::GroundOverlay.to_string(), "ground_overlay");
        assert_eq!(OverlayKind::from_str("polyline").unwrap(), OverlayKind::Polyline);
        assert_eq!(OverlayKind::iter().count(), 5);
    }

    #[test]
    fn test_from_args_reports_invalid_arguments() {
        let err = from_args::<LatLng>(&serde_json::json!({ "lat": 1.0 })).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENTS");
        assert!(err.to_string().contains("lng"));
    }

    #[test]
    fn test_snapshot_format_aliases() {
        let format: SnapshotFormat = serde_json::from_str("\"jpg\"").unwrap();
        assert_eq!(format, SnapshotFormat::Jpeg);
        assert_eq!(SnapshotFormat::default(), SnapshotFormat::Png);
    }
}
