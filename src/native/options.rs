//! Construction options handed to the native SDK

use std::sync::Arc;

use image::RgbaImage;

use crate::models::{Color, LatLng, LatLngBounds};

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerIcon {
    /// The SDK's stock pin
    Default,
    /// Stock pin with a hue in degrees
    Hue(f32),
    /// Stock pin tinted with a color
    Tinted(Color),
    /// Custom bitmap already scaled to device pixels
    Bitmap(Arc<RgbaImage>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions {
    pub position: LatLng,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub alpha: f32,
    pub flat: bool,
    pub draggable: bool,
    pub z_index: f32,
    pub anchor: Option<(f32, f32)>,
    pub icon: MarkerIcon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonOptions {
    pub outer: Vec<LatLng>,
    pub holes: Vec<Vec<LatLng>>,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub z_index: f32,
    pub geodesic: bool,
    pub clickable: bool,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleOptions {
    pub center: LatLng,
    pub radius: f64,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub z_index: f32,
    pub clickable: bool,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanOptions {
    pub color: Color,
    pub segments: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolylineOptions {
    pub points: Vec<LatLng>,
    /// Device pixels
    pub width: f32,
    pub color: Color,
    pub z_index: f32,
    pub geodesic: bool,
    pub clickable: bool,
    pub spans: Vec<SpanOptions>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayImage {
    Bitmap(Arc<RgbaImage>),
    /// Resolved by the SDK
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundOverlayOptions {
    pub bounds: LatLngBounds,
    pub image: OverlayImage,
}
