//! Polygon, circle and polyline descriptions

use serde::{Deserialize, Deserializer, Serialize};

use super::geometry::{Color, LatLng};
use super::{Description, OverlayKind};
use crate::errors::{BridgeResult, MapError};

/// Polygon description; the first path is the outer ring, every later path a hole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    #[serde(alias = "shapes", deserialize_with = "deserialize_paths")]
    pub paths: Vec<Vec<LatLng>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_weight: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    #[serde(default)]
    pub geodesic: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathsRepr {
    Nested(Vec<Vec<LatLng>>),
    Single(Vec<LatLng>),
}

fn deserialize_paths<'de, D>(deserializer: D) -> Result<Vec<Vec<LatLng>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PathsRepr::deserialize(deserializer)? {
        PathsRepr::Nested(paths) => paths,
        PathsRepr::Single(path) => vec![path],
    })
}

impl Polygon {
    pub fn new(outer: Vec<LatLng>) -> Self {
        Self {
            paths: vec![outer],
            fill_color: None,
            fill_opacity: None,
            stroke_color: None,
            stroke_opacity: None,
            stroke_weight: None,
            z_index: None,
            geodesic: false,
            clickable: false,
            tag: None,
        }
    }

    pub fn outer(&self) -> &[LatLng] {
        self.paths.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn holes(&self) -> &[Vec<LatLng>] {
        self.paths.get(1..).unwrap_or(&[])
    }
}

impl Description for Polygon {
    const KIND: OverlayKind = OverlayKind::Polygon;

    fn validate(&self) -> BridgeResult<()> {
        if self.outer().len() < 3 {
            return Err(MapError::invalid_arguments(
                "Polygon outer path needs at least 3 points",
            ));
        }
        for (index, path) in self.paths.iter().enumerate() {
            for point in path {
                point.validate(&format!("paths[{index}]"))?;
            }
        }
        Color::resolve(self.fill_color.as_deref(), None, Color::BLACK)?;
        Color::resolve(self.stroke_color.as_deref(), None, Color::BLACK)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    pub center: LatLng,
    /// Radius in meters
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_weight: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Circle {
    pub fn new(center: LatLng, radius: f64) -> Self {
        Self {
            center,
            radius,
            fill_color: None,
            fill_opacity: None,
            stroke_color: None,
            stroke_opacity: None,
            stroke_weight: None,
            z_index: None,
            clickable: false,
            tag: None,
        }
    }
}

impl Description for Circle {
    const KIND: OverlayKind = OverlayKind::Circle;

    fn validate(&self) -> BridgeResult<()> {
        self.center.validate("center")?;
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(MapError::invalid_arguments(format!(
                "Circle radius {} must be a non-negative number",
                self.radius
            )));
        }
        Color::resolve(self.fill_color.as_deref(), None, Color::BLACK)?;
        Color::resolve(self.stroke_color.as_deref(), None, Color::BLACK)?;
        Ok(())
    }
}

/// Colored span over a polyline, optionally limited to a number of segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSpan {
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polyline {
    pub path: Vec<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_weight: Option<f32>,
    #[serde(default)]
    pub geodesic: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub style_spans: Vec<StyleSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Polyline {
    pub fn new(path: Vec<LatLng>) -> Self {
        Self {
            path,
            stroke_color: None,
            stroke_opacity: None,
            stroke_weight: None,
            geodesic: false,
            clickable: false,
            z_index: None,
            style_spans: Vec::new(),
            tag: None,
        }
    }
}

impl Description for Polyline {
    const KIND: OverlayKind = OverlayKind::Polyline;

    fn validate(&self) -> BridgeResult<()> {
        if self.path.len() < 2 {
            return Err(MapError::invalid_arguments(
                "Polyline path needs at least 2 points",
            ));
        }
        for point in &self.path {
            point.validate("path")?;
        }
        Color::resolve(self.stroke_color.as_deref(), None, Color::BLACK)?;
        for span in &self.style_spans {
            Color::parse_hex(&span.color)?;
            if let Some(segments) = span.segments {
                if !(segments.is_finite() && segments > 0.0) {
                    return Err(MapError::invalid_arguments(format!(
                        "Style span segments {segments} must be positive"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> Vec<LatLng> {
        vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 0.0),
        ]
    }

    #[test]
    fn test_polygon_accepts_single_or_nested_paths() {
        let single: Polygon = serde_json::from_value(json!({
            "paths": [{ "lat": 0.0, "lng": 0.0 }, { "lat": 0.0, "lng": 1.0 }, { "lat": 1.0, "lng": 1.0 }]
        }))
        .unwrap();
        assert_eq!(single.paths.len(), 1);
        assert!(single.holes().is_empty());

        let nested: Polygon = serde_json::from_value(json!({
            "shapes": [
                [{ "lat": 0.0, "lng": 0.0 }, { "lat": 0.0, "lng": 4.0 }, { "lat": 4.0, "lng": 4.0 }],
                [{ "lat": 1.0, "lng": 1.0 }, { "lat": 1.0, "lng": 2.0 }, { "lat": 2.0, "lng": 2.0 }]
            ],
            "tag": "zone"
        }))
        .unwrap();
        assert_eq!(nested.outer().len(), 3);
        assert_eq!(nested.holes().len(), 1);
        assert_eq!(nested.tag.as_deref(), Some("zone"));
    }

    #[test]
    fn test_polygon_validation() {
        assert!(Polygon::new(square()).validate().is_ok());
        assert!(Polygon::new(square()[..2].to_vec()).validate().is_err());

        let mut bad_color = Polygon::new(square());
        bad_color.fill_color = Some("blue".to_string());
        assert!(bad_color.validate().is_err());
    }

    #[test]
    fn test_circle_validation() {
        assert!(Circle::new(LatLng::new(1.0, 1.0), 50.0).validate().is_ok());
        assert!(Circle::new(LatLng::new(1.0, 1.0), -1.0).validate().is_err());
    }

    #[test]
    fn test_polyline_style_spans() {
        let line: Polyline = serde_json::from_value(json!({
            "path": [{ "lat": 0.0, "lng": 0.0 }, { "lat": 1.0, "lng": 1.0 }],
            "strokeWeight": 4.0,
            "styleSpans": [{ "color": "#ff0000" }, { "color": "#00ff00", "segments": 2.0 }]
        }))
        .unwrap();
        assert_eq!(line.style_spans.len(), 2);
        assert_eq!(line.style_spans[1].segments, Some(2.0));
        assert!(line.validate().is_ok());

        let short = Polyline::new(vec![LatLng::new(0.0, 0.0)]);
        assert!(short.validate().is_err());
    }
}
