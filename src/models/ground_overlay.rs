use serde::{Deserialize, Serialize};

use super::geometry::{LatLng, LatLngBounds};
use super::{Description, OverlayKind};
use crate::errors::{BridgeResult, MapError};

/// Degrees of latitude per overlay height unit
const LAT_SPAN_DIVISOR: f64 = 200_000.0;
/// Degrees of longitude per overlay width unit
const LNG_SPAN_DIVISOR: f64 = 150_000.0;

/// Image laid flat on the map, anchored at a point and sized in overlay units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundOverlay {
    pub latitude: f64,
    pub longitude: f64,
    pub width: f64,
    pub height: f64,
    /// A `data:` URL or a path the native SDK resolves
    pub image_path: String,
}

impl GroundOverlay {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    pub fn bounds(&self) -> LatLngBounds {
        let lat_span = self.height / LAT_SPAN_DIVISOR;
        let lng_span = self.width / LNG_SPAN_DIVISOR;
        LatLngBounds::new(
            LatLng::new(self.latitude - lat_span, self.longitude - lng_span),
            LatLng::new(self.latitude + lat_span, self.longitude + lng_span),
        )
    }

    pub fn is_data_url(&self) -> bool {
        self.image_path.starts_with("data:")
    }
}

impl Description for GroundOverlay {
    const KIND: OverlayKind = OverlayKind::GroundOverlay;

    fn validate(&self) -> BridgeResult<()> {
        self.position().validate("position")?;
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(MapError::invalid_arguments(
                "Ground overlay width and height must be positive",
            ));
        }
        if self.image_path.trim().is_empty() {
            return Err(MapError::invalid_arguments(
                "Ground overlay is missing the required 'imagePath' property",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_anchor_and_size() {
        let overlay = GroundOverlay {
            latitude: 10.0,
            longitude: 20.0,
            width: 300.0,
            height: 400.0,
            image_path: "overlays/floor.png".to_string(),
        };
        let bounds = overlay.bounds();
        assert!((bounds.southwest.lat - (10.0 - 0.002)).abs() < 1e-12);
        assert!((bounds.northeast.lng - (20.0 + 0.002)).abs() < 1e-12);
        let center = bounds.center();
        assert!((center.lat - 10.0).abs() < 1e-9 && (center.lng - 20.0).abs() < 1e-9);
        assert!(!overlay.is_data_url());
        assert!(overlay.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_image_path() {
        let overlay = GroundOverlay {
            latitude: 0.0,
            longitude: 0.0,
            width: 1.0,
            height: 1.0,
            image_path: " ".to_string(),
        };
        assert!(overlay.validate().is_err());
    }
}
