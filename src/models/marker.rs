use serde::{Deserialize, Serialize};

use super::geometry::{Color, LatLng, Point, Size};
use super::{Description, OverlayKind};
use crate::config::defaults::MAX_ICON_EDGE_PX;
use crate::errors::{BridgeResult, MapError};

/// Marker description as sent by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub coordinate: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_flat: Option<bool>,
    /// Cache key for the decoded icon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_id: Option<String>,
    /// Inline `data:image/...;base64,` payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_size: Option<Size>,
    /// Anchor in icon pixels; normalised against `icon_size` when building
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_anchor: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint_color: Option<TintColor>,
    /// Hue in degrees for the default marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_hue: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

/// Tint in 0-255 channels with a 0-1 alpha
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TintColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl TintColor {
    pub fn to_color(&self) -> Color {
        let channel = |v: f64| v.clamp(0.0, 255.0).round() as u8;
        Color::rgba(
            channel(self.r),
            channel(self.g),
            channel(self.b),
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        )
    }
}

impl Marker {
    pub fn at(coordinate: LatLng) -> Self {
        Self {
            coordinate,
            opacity: None,
            title: None,
            snippet: None,
            is_flat: None,
            icon_id: None,
            icon_url: None,
            icon_size: None,
            icon_anchor: None,
            draggable: None,
            tint_color: None,
            color_hue: None,
            z_index: None,
        }
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_icon<I: Into<String>, U: Into<String>>(mut self, icon_id: I, icon_url: U) -> Self {
        self.icon_id = Some(icon_id.into());
        self.icon_url = Some(icon_url.into());
        self
    }

    /// Anchor as a fraction of the icon size, if both are given
    pub fn normalized_anchor(&self) -> Option<(f32, f32)> {
        let anchor = self.icon_anchor?;
        let size = self.icon_size?;
        if size.width <= 0.0 || size.height <= 0.0 {
            return None;
        }
        Some(((anchor.x / size.width) as f32, (anchor.y / size.height) as f32))
    }

    /// The `icon_id` if it is present and non-empty
    pub fn cache_key(&self) -> Option<&str> {
        self.icon_id.as_deref().filter(|id| !id.is_empty())
    }
}

impl Description for Marker {
    const KIND: OverlayKind = OverlayKind::Marker;

    fn validate(&self) -> BridgeResult<()> {
        self.coordinate.validate("coordinate")?;
        if let Some(opacity) = self.opacity {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(MapError::invalid_arguments(format!(
                    "Marker opacity {opacity} is outside [0, 1]"
                )));
            }
        }
        if let Some(size) = self.icon_size {
            let edge_ok = |v: f64| v.is_finite() && v > 0.0 && v <= MAX_ICON_EDGE_PX;
            if !(edge_ok(size.width) && edge_ok(size.height)) {
                return Err(MapError::invalid_arguments(format!(
                    "Marker iconSize {}x{} must be positive and at most {} per edge",
                    size.width, size.height, MAX_ICON_EDGE_PX
                )));
            }
        }
        Ok(())
    }
}
