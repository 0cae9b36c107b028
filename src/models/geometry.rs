//! Geometry primitives shared by descriptions, camera state and events

use serde::{Deserialize, Serialize};

use crate::errors::{BridgeResult, MapError};

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self, field: &str) -> BridgeResult<()> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(MapError::invalid_arguments(format!(
                "{field} must have finite 'lat' and 'lng'"
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(MapError::invalid_arguments(format!(
                "{field}.lat {} is outside [-90, 90]",
                self.lat
            )));
        }
        Ok(())
    }
}

/// Axis-aligned geographic rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub southwest: LatLng,
    pub northeast: LatLng,
}

impl LatLngBounds {
    pub fn new(southwest: LatLng, northeast: LatLng) -> Self {
        Self {
            southwest,
            northeast,
        }
    }

    /// Smallest bounds containing every point, `None` for an empty slice
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self::new(*first, *first);
        for point in &points[1..] {
            bounds.southwest.lat = bounds.southwest.lat.min(point.lat);
            bounds.southwest.lng = bounds.southwest.lng.min(point.lng);
            bounds.northeast.lat = bounds.northeast.lat.max(point.lat);
            bounds.northeast.lng = bounds.northeast.lng.max(point.lng);
        }
        Some(bounds)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.southwest.lat + self.northeast.lat) / 2.0,
            (self.southwest.lng + self.northeast.lng) / 2.0,
        )
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.southwest.lat
            && point.lat <= self.northeast.lat
            && point.lng >= self.southwest.lng
            && point.lng <= self.northeast.lng
    }
}

/// Width/height pair in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Pixel offset, e.g. a marker anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Map view frame in CSS pixels as reported by the host layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FrameRect {
    /// Scale to device pixels the way the native view expects
    pub fn to_screen(&self, device_pixel_ratio: f64) -> ScreenRect {
        ScreenRect {
            left: scaled_pixels(self.x, device_pixel_ratio),
            top: scaled_pixels(self.y, device_pixel_ratio),
            right: scaled_pixels(self.x + self.width, device_pixel_ratio),
            bottom: scaled_pixels(self.y + self.height, device_pixel_ratio),
        }
    }
}

/// Device-pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Map content padding in device pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Padding {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

/// Convert CSS pixels to device pixels, rounding half up
pub fn scaled_pixels(pixels: f64, device_pixel_ratio: f64) -> i32 {
    (pixels * device_pixel_ratio + 0.5) as i32
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`
    pub fn parse_hex(value: &str) -> BridgeResult<Self> {
        let invalid = || MapError::invalid_arguments(format!("Invalid color '{value}'"));
        let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |i: usize| byte(&hex[i..i + 1].repeat(2));
                Ok(Self::rgba(expand(0)?, expand(1)?, expand(2)?, 255))
            }
            6 => Ok(Self::rgba(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                255,
            )),
            8 => Ok(Self::rgba(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => Err(invalid()),
        }
    }

    /// Replace alpha with `opacity` in `[0, 1]`
    pub fn with_opacity(self, opacity: f32) -> Self {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { a: alpha, ..self }
    }

    /// Parse an optional hex string with an optional opacity, falling back to `default`
    pub fn resolve(
        value: Option<&str>,
        opacity: Option<f32>,
        default: Color,
    ) -> BridgeResult<Self> {
        let color = match value {
            Some(hex) => Self::parse_hex(hex)?,
            None => default,
        };
        Ok(match opacity {
            Some(opacity) => color.with_opacity(opacity),
            None => color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("#fff", Color::rgba(255, 255, 255, 255))]
    #[case("#FF0000", Color::rgba(255, 0, 0, 255))]
    #[case("#00ff0080", Color::rgba(0, 255, 0, 128))]
    #[case(" #123456 ", Color::rgba(0x12, 0x34, 0x56, 255))]
    fn test_parse_hex(#[case] input: &str, #[case] expected: Color) {
        assert_eq!(Color::parse_hex(input).unwrap(), expected);
    }

    #[rstest]
    #[case("red")]
    #[case("#12")]
    #[case("#gggggg")]
    #[case("#1234567")]
    fn test_parse_hex_rejects(#[case] input: &str) {
        assert!(matches!(
            Color::parse_hex(input),
            Err(MapError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_resolve_applies_opacity() {
        let color = Color::resolve(Some("#000000"), Some(0.5), Color::TRANSPARENT).unwrap();
        assert_eq!(color.a, 128);
        let fallback = Color::resolve(None, None, Color::BLACK).unwrap();
        assert_eq!(fallback, Color::BLACK);
    }

    #[test]
    fn test_bounds_from_points() {
        let bounds = LatLngBounds::from_points(&[
            LatLng::new(1.0, 5.0),
            LatLng::new(-2.0, 3.0),
            LatLng::new(0.5, 9.0),
        ])
        .unwrap();
        assert_eq!(bounds.southwest, LatLng::new(-2.0, 3.0));
        assert_eq!(bounds.northeast, LatLng::new(1.0, 9.0));
        assert!(bounds.contains(&LatLng::new(0.0, 4.0)));
        assert!(LatLngBounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_frame_scaling_rounds_half_up() {
        let frame = FrameRect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        };
        let screen = frame.to_screen(2.5);
        assert_eq!(screen, ScreenRect { left: 25, top: 50, right: 275, bottom: 175 });
        assert_eq!(screen.width(), 250);
    }

    #[test]
    fn test_latlng_validation() {
        assert!(LatLng::new(45.0, 10.0).validate("coordinate").is_ok());
        assert!(LatLng::new(95.0, 10.0).validate("coordinate").is_err());
        assert!(LatLng::new(f64::NAN, 10.0).validate("coordinate").is_err());
    }
}
