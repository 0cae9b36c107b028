use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use super::geometry::{FrameRect, LatLng};
use crate::errors::MapError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum MapType {
    #[default]
    Normal,
    Hybrid,
    Satellite,
    Terrain,
    None,
}

impl MapType {
    /// Unknown names fall back to `Normal`
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!("Unknown map type '{}', defaulting to Normal", value);
            MapType::Normal
        })
    }
}

/// Session creation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMapConfig", rename_all = "camelCase")]
pub struct MapConfig {
    /// Frame in CSS pixels
    pub frame: FrameRect,
    pub center: LatLng,
    pub zoom: f64,
    /// Serialized style JSON handed to the SDK
    pub styles: Option<String>,
    pub map_type: MapType,
    pub device_pixel_ratio: f64,
    /// Cloud map id for vector styling
    pub map_id: Option<String>,
}

impl MapConfig {
    pub fn new(frame: FrameRect, center: LatLng, zoom: f64) -> Self {
        Self {
            frame,
            center,
            zoom,
            styles: None,
            map_type: MapType::Normal,
            device_pixel_ratio: 1.0,
            map_id: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMapConfig {
    width: Option<f64>,
    height: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    zoom: Option<f64>,
    center: Option<serde_json::Value>,
    #[serde(default)]
    styles: Option<serde_json::Value>,
    #[serde(default, alias = "mapType")]
    map_type_id: Option<String>,
    #[serde(default)]
    device_pixel_ratio: Option<f64>,
    #[serde(default, alias = "iOSMapId", alias = "androidMapId")]
    map_id: Option<String>,
    // Serialized form of `MapConfig` nests the frame
    #[serde(default)]
    frame: Option<FrameRect>,
}

fn missing(property: &str) -> MapError {
    MapError::invalid_arguments(format!(
        "GoogleMapConfig object is missing the required '{property}' property"
    ))
}

impl TryFrom<RawMapConfig> for MapConfig {
    type Error = MapError;

    fn try_from(raw: RawMapConfig) -> Result<Self, Self::Error> {
        let frame = match raw.frame {
            Some(frame) => frame,
            None => FrameRect {
                x: raw.x.ok_or_else(|| missing("x"))?,
                y: raw.y.ok_or_else(|| missing("y"))?,
                width: raw.width.ok_or_else(|| missing("width"))?.round(),
                height: raw.height.ok_or_else(|| missing("height"))?.round(),
            },
        };
        let zoom = raw.zoom.ok_or_else(|| missing("zoom"))?;
        let center: LatLng = serde_json::from_value(raw.center.ok_or_else(|| missing("center"))?)
            .map_err(|_| {
                MapError::invalid_arguments(
                    "LatLng object is missing the required 'lat' and/or 'lng' property",
                )
            })?;
        center.validate("center")?;

        let styles = match raw.styles {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(styles)) => Some(styles),
            Some(other) => Some(other.to_string()),
        };

        let device_pixel_ratio = raw.device_pixel_ratio.unwrap_or(1.0);
        if !(device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0) {
            return Err(MapError::invalid_arguments(
                "devicePixelRatio must be a positive number",
            ));
        }

        Ok(MapConfig {
            frame,
            center,
            zoom,
            styles,
            map_type: raw
                .map_type_id
                .as_deref()
                .map(MapType::parse_lenient)
                .unwrap_or_default(),
            device_pixel_ratio,
            map_id: raw.map_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use tracing_test::traced_test;

    fn base() -> serde_json::Value {
        json!({
            "width": 320.4,
            "height": 479.6,
            "x": 0.0,
            "y": 64.0,
            "zoom": 8.0,
            "center": { "lat": 33.6, "lng": -117.9 },
            "devicePixelRatio": 2.0
        })
    }

    #[test]
    fn test_parses_and_rounds_frame() {
        let config: MapConfig = serde_json::from_value(base()).unwrap();
        assert_eq!(config.frame.width, 320.0);
        assert_eq!(config.frame.height, 480.0);
        assert_eq!(config.map_type, MapType::Normal);
        assert_eq!(config.device_pixel_ratio, 2.0);
    }

    #[rstest]
    #[case("width")]
    #[case("height")]
    #[case("x")]
    #[case("y")]
    #[case("zoom")]
    #[case("center")]
    fn test_missing_required_property(#[case] property: &str) {
        let mut value = base();
        value.as_object_mut().unwrap().remove(property);
        let err = serde_json::from_value::<MapConfig>(value).unwrap_err();
        assert!(err.to_string().contains(&format!("'{property}'")));
    }

    #[test]
    fn test_styles_array_is_serialized() {
        let mut value = base();
        value["styles"] = json!([{ "featureType": "poi", "stylers": [{ "visibility": "off" }] }]);
        value["mapTypeId"] = json!("satellite");
        let config: MapConfig = serde_json::from_value(value).unwrap();
        assert!(config.styles.unwrap().contains("featureType"));
        assert_eq!(config.map_type, MapType::Satellite);
    }

    #[test]
    fn test_round_trips_own_serialization() {
        let config: MapConfig = serde_json::from_value(base()).unwrap();
        let encoded = serde_json::to_value(&config).unwrap();
        let decoded: MapConfig = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, config);
    }

    #[traced_test]
    #[test]
    fn test_unknown_map_type_degrades_to_normal() {
        assert_eq!(MapType::parse_lenient("Moon"), MapType::Normal);
        assert!(logs_contain("Unknown map type 'Moon'"));
        assert_eq!(MapType::parse_lenient("TERRAIN"), MapType::Terrain);
    }
}
