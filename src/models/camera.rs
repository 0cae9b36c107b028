use serde::{Deserialize, Serialize};

use super::geometry::LatLng;
use crate::errors::BridgeResult;

/// Full camera state as reported by the native map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPosition {
    pub target: LatLng,
    pub zoom: f64,
    pub bearing: f64,
    pub tilt: f64,
}

impl CameraPosition {
    pub fn new(target: LatLng, zoom: f64) -> Self {
        Self {
            target,
            zoom,
            bearing: 0.0,
            tilt: 0.0,
        }
    }
}

/// Partial camera update; omitted fields keep the current camera's values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f64>,
    /// Tilt in degrees
    #[serde(default, alias = "tilt", skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animate: Option<bool>,
}

impl CameraConfig {
    pub fn zoom(zoom: f64) -> Self {
        Self {
            zoom: Some(zoom),
            ..Self::default()
        }
    }

    /// Merge onto `current`, validating any supplied target
    pub fn resolve(&self, current: &CameraPosition) -> BridgeResult<CameraPosition> {
        if let Some(target) = &self.coordinate {
            target.validate("coordinate")?;
        }
        Ok(CameraPosition {
            target: self.coordinate.unwrap_or(current.target),
            zoom: self.zoom.unwrap_or(current.zoom),
            bearing: self.bearing.unwrap_or(current.bearing),
            tilt: self.angle.unwrap_or(current.tilt),
        })
    }

    pub fn animate(&self) -> bool {
        self.animate.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> CameraPosition {
        CameraPosition {
            target: LatLng::new(48.85, 2.35),
            zoom: 12.0,
            bearing: 30.0,
            tilt: 15.0,
        }
    }

    #[test]
    fn test_zoom_only_keeps_other_fields() {
        let resolved = CameraConfig::zoom(5.0).resolve(&current()).unwrap();
        assert_eq!(resolved.zoom, 5.0);
        assert_eq!(resolved.target, current().target);
        assert_eq!(resolved.bearing, 30.0);
        assert_eq!(resolved.tilt, 15.0);
    }

    #[test]
    fn test_empty_config_is_identity() {
        let config = CameraConfig::default();
        assert_eq!(config.resolve(&current()).unwrap(), current());
        assert!(!config.animate());
    }

    #[test]
    fn test_tilt_alias() {
        let config: CameraConfig = serde_json::from_str(r#"{"tilt": 45.0, "animate": true}"#).unwrap();
        assert_eq!(config.angle, Some(45.0));
        assert!(config.animate());
    }
}
