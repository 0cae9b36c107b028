//! Description to native construction options
//!
//! Builders never touch a registry. Marker building consults the shared
//! [`IconCache`] and degrades to a stock pin when an inline icon cannot be
//! decoded.

use std::sync::Arc;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::{debug, warn};

use super::icon_cache::{IconBitmap, IconCache};
use crate::config::defaults::MAX_ICON_PIXELS;
use crate::errors::{BridgeResult, MapError};
use crate::models::{Circle, Color, GroundOverlay, Marker, Polygon, Polyline};
use crate::native::{
    CircleOptions, GroundOverlayOptions, MarkerIcon, MarkerOptions, OverlayImage, PolygonOptions,
    PolylineOptions, SpanOptions,
};
use crate::observability::BridgeMetrics;

/// Accepts payloads with or without trailing `=` padding
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DEFAULT_STROKE_WIDTH: f32 = 1.0;

/// Decode the base64 part of a `data:` URL into RGBA pixels
pub fn decode_data_url(url: &str) -> BridgeResult<RgbaImage> {
    let resource = || url.chars().take(48).collect::<String>();
    let payload = url
        .split_once("base64,")
        .map(|(_, data)| data)
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| MapError::resource_decode(resource(), "not a base64 data URL"))?;

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| MapError::resource_decode(resource(), e.to_string()))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| MapError::resource_decode(resource(), e.to_string()))?;
    Ok(image.to_rgba8())
}

#[derive(Debug, Clone)]
pub struct EntityBuilder {
    icon_cache: Arc<IconCache>,
    device_pixel_ratio: f64,
}

impl EntityBuilder {
    pub fn new(icon_cache: Arc<IconCache>, device_pixel_ratio: f64) -> Self {
        Self {
            icon_cache,
            device_pixel_ratio,
        }
    }

    pub fn icon_cache(&self) -> &Arc<IconCache> {
        &self.icon_cache
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    pub fn build_marker(&self, marker: &Marker) -> MarkerOptions {
        MarkerOptions {
            position: marker.coordinate,
            title: marker.title.clone(),
            snippet: marker.snippet.clone(),
            alpha: marker.opacity.unwrap_or(1.0),
            flat: marker.is_flat.unwrap_or(false),
            draggable: marker.draggable.unwrap_or(false),
            z_index: marker.z_index.unwrap_or(0) as f32,
            anchor: marker.normalized_anchor(),
            icon: self.resolve_icon(marker),
        }
    }

    /// Cached bitmap, then inline payload, then tint, hue or the stock pin
    pub fn resolve_icon(&self, marker: &Marker) -> MarkerIcon {
        if let Some(key) = marker.cache_key() {
            if let Some(icon) = self
                .icon_cache
                .get(key)
                .and_then(|bitmap| self.scaled_icon(&bitmap, marker))
            {
                debug!("Using cached icon '{}'", key);
                return icon;
            }
        }

        if let Some(url) = marker.icon_url.as_deref() {
            match decode_data_url(url) {
                Ok(image) => {
                    let bitmap = IconBitmap::new(image);
                    if let Some(key) = marker.cache_key() {
                        self.icon_cache.put(key, bitmap.clone());
                    }
                    if let Some(icon) = self.scaled_icon(&bitmap, marker) {
                        return icon;
                    }
                }
                Err(e) => {
                    BridgeMetrics::global().record_icon_decode_failure();
                    warn!("{}. Using default marker icon.", e);
                }
            }
        }

        if let Some(tint) = &marker.tint_color {
            MarkerIcon::Tinted(tint.to_color())
        } else if let Some(hue) = marker.color_hue {
            MarkerIcon::Hue(hue.rem_euclid(360.0))
        } else {
            MarkerIcon::Default
        }
    }

    /// Copy of the bitmap scaled to the requested icon size in device pixels
    ///
    /// A target above [`MAX_ICON_PIXELS`] keeps the bitmap at its decoded size.
    fn scaled_icon(&self, bitmap: &IconBitmap, marker: &Marker) -> Option<MarkerIcon> {
        let target = marker.icon_size.and_then(|size| {
            let width = (size.width * self.device_pixel_ratio).max(1.0);
            let height = (size.height * self.device_pixel_ratio).max(1.0);
            if width.is_finite() && height.is_finite() && width * height <= MAX_ICON_PIXELS as f64 {
                Some((width as u32, height as u32))
            } else {
                warn!(
                    "Icon size {}x{} device pixels exceeds the {} pixel limit, keeping decoded size",
                    width, height, MAX_ICON_PIXELS
                );
                None
            }
        });
        let scaled = bitmap.with_pixels(|pixels| match target {
            Some((width, height)) => imageops::resize(pixels, width, height, FilterType::Nearest),
            None => pixels.clone(),
        })?;
        Some(MarkerIcon::Bitmap(Arc::new(scaled)))
    }

    pub fn build_polygon(&self, polygon: &Polygon) -> BridgeResult<PolygonOptions> {
        Ok(PolygonOptions {
            outer: polygon.outer().to_vec(),
            holes: polygon.holes().to_vec(),
            fill_color: Color::resolve(
                polygon.fill_color.as_deref(),
                polygon.fill_opacity,
                Color::TRANSPARENT,
            )?,
            stroke_color: Color::resolve(
                polygon.stroke_color.as_deref(),
                polygon.stroke_opacity,
                Color::BLACK,
            )?,
            stroke_width: polygon.stroke_weight.unwrap_or(DEFAULT_STROKE_WIDTH),
            z_index: polygon.z_index.unwrap_or(0) as f32,
            geodesic: polygon.geodesic,
            clickable: polygon.clickable,
            tag: polygon.tag.clone(),
        })
    }

    pub fn build_circle(&self, circle: &Circle) -> BridgeResult<CircleOptions> {
        Ok(CircleOptions {
            center: circle.center,
            radius: circle.radius,
            fill_color: Color::resolve(
                circle.fill_color.as_deref(),
                circle.fill_opacity,
                Color::TRANSPARENT,
            )?,
            stroke_color: Color::resolve(
                circle.stroke_color.as_deref(),
                circle.stroke_opacity,
                Color::BLACK,
            )?,
            stroke_width: circle.stroke_weight.unwrap_or(DEFAULT_STROKE_WIDTH),
            z_index: circle.z_index.unwrap_or(0) as f32,
            clickable: circle.clickable,
            tag: circle.tag.clone(),
        })
    }

    pub fn build_polyline(&self, line: &Polyline) -> BridgeResult<PolylineOptions> {
        let spans = line
            .style_spans
            .iter()
            .map(|span| {
                Ok(SpanOptions {
                    color: Color::parse_hex(&span.color)?,
                    segments: span.segments,
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(PolylineOptions {
            points: line.path.clone(),
            width: line.stroke_weight.unwrap_or(DEFAULT_STROKE_WIDTH)
                * self.device_pixel_ratio as f32,
            color: Color::resolve(
                line.stroke_color.as_deref(),
                line.stroke_opacity,
                Color::BLACK,
            )?,
            z_index: line.z_index.unwrap_or(0) as f32,
            geodesic: line.geodesic,
            clickable: line.clickable,
            spans,
            tag: line.tag.clone(),
        })
    }

    /// Inline images are decoded here and never cached; anything else is an SDK path
    pub fn build_ground_overlay(
        &self,
        overlay: &GroundOverlay,
    ) -> BridgeResult<GroundOverlayOptions> {
        let image = if overlay.is_data_url() {
            OverlayImage::Bitmap(Arc::new(decode_data_url(&overlay.image_path)?))
        } else {
            OverlayImage::Path(overlay.image_path.clone())
        };
        Ok(GroundOverlayOptions {
            bounds: overlay.bounds(),
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatLng, Size, StyleSpan, TintColor};
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;
    use tracing_test::traced_test;

    fn png_data_url(width: u32, height: u32, color: [u8; 4]) -> String {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn builder(dpr: f64) -> EntityBuilder {
        EntityBuilder::new(Arc::new(IconCache::new(1024 * 1024)), dpr)
    }

    fn bitmap_of(icon: &MarkerIcon) -> &RgbaImage {
        match icon {
            MarkerIcon::Bitmap(image) => image,
            other => panic!("expected bitmap icon, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_accepts_unpadded_and_wrapped_payloads() {
        let url = png_data_url(3, 2, [1, 2, 3, 255]);
        let unpadded = url.trim_end_matches('=').to_string();
        assert_eq!(decode_data_url(&unpadded).unwrap().dimensions(), (3, 2));

        let (prefix, data) = url.split_once("base64,").unwrap();
        let wrapped = format!("{prefix}base64,{}\n{}", &data[..10], &data[10..]);
        assert_eq!(decode_data_url(&wrapped).unwrap().dimensions(), (3, 2));
    }

    #[test]
    fn test_decode_rejects_non_data_urls() {
        assert!(matches!(
            decode_data_url("https://example.com/pin.png"),
            Err(MapError::ResourceDecode { .. })
        ));
        assert!(decode_data_url("data:image/png;base64,!!!!").is_err());
        assert!(decode_data_url("data:image/png;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn test_marker_icon_is_cached_and_scaled() {
        let builder = builder(2.0);
        let mut marker = Marker::at(LatLng::new(1.0, 1.0))
            .with_icon("pin", png_data_url(8, 8, [255, 0, 0, 255]));
        marker.icon_size = Some(Size {
            width: 12.0,
            height: 6.0,
        });

        let options = builder.build_marker(&marker);
        assert_eq!(bitmap_of(&options.icon).dimensions(), (24, 12));
        assert!(builder.icon_cache().contains("pin"));
        assert_eq!(builder.icon_cache().get("pin").unwrap().width(), 8);
    }

    #[traced_test]
    #[test]
    fn test_oversized_target_keeps_decoded_size() {
        let builder = builder(4.0);
        let mut marker = Marker::at(LatLng::new(1.0, 1.0))
            .with_icon("huge", png_data_url(2, 2, [0, 255, 0, 255]));
        marker.icon_size = Some(Size {
            width: 1e6,
            height: 1e6,
        });

        let options = builder.build_marker(&marker);
        assert_eq!(bitmap_of(&options.icon).dimensions(), (2, 2));
        assert!(logs_contain("exceeds the"));
    }

    #[test]
    fn test_cached_icon_wins_over_new_payload() {
        let builder = builder(1.0);
        let first = Marker::at(LatLng::new(0.0, 0.0)).with_icon("pin", png_data_url(4, 4, [255, 0, 0, 255]));
        let second = Marker::at(LatLng::new(0.0, 0.0)).with_icon("pin", png_data_url(9, 9, [0, 0, 255, 255]));

        builder.build_marker(&first);
        let options = builder.build_marker(&second);
        let image = bitmap_of(&options.icon);
        assert_eq!(image.dimensions(), (4, 4));
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_inline_icon_without_id_is_not_cached() {
        let builder = builder(1.0);
        let mut marker = Marker::at(LatLng::new(0.0, 0.0));
        marker.icon_url = Some(png_data_url(2, 2, [0, 0, 0, 255]));
        let options = builder.build_marker(&marker);
        assert!(matches!(options.icon, MarkerIcon::Bitmap(_)));
        assert!(builder.icon_cache().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_undecodable_icon_degrades_to_hue() {
        let builder = builder(1.0);
        let mut marker = Marker::at(LatLng::new(0.0, 0.0)).with_icon("broken", "data:image/png;base64,bm9wZQ==");
        marker.color_hue = Some(400.0);

        let options = builder.build_marker(&marker);
        assert_eq!(options.icon, MarkerIcon::Hue(40.0));
        assert!(!builder.icon_cache().contains("broken"));
        assert!(logs_contain("Using default marker icon"));
    }

    #[test]
    fn test_tint_takes_precedence_over_hue() {
        let mut marker = Marker::at(LatLng::new(0.0, 0.0));
        marker.color_hue = Some(120.0);
        marker.tint_color = Some(TintColor {
            r: 0.0,
            g: 0.0,
            b: 255.0,
            a: 1.0,
        });
        let options = builder(1.0).build_marker(&marker);
        assert_eq!(options.icon, MarkerIcon::Tinted(Color::rgba(0, 0, 255, 255)));
        assert_eq!(options.alpha, 1.0);
    }

    #[test]
    fn test_polygon_outer_ring_and_holes() {
        let mut polygon = Polygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 4.0),
            LatLng::new(4.0, 4.0),
        ]);
        polygon.paths.push(vec![
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 2.0),
            LatLng::new(2.0, 2.0),
        ]);
        polygon.fill_color = Some("#ff0000".into());
        polygon.fill_opacity = Some(0.5);

        let options = builder(1.0).build_polygon(&polygon).unwrap();
        assert_eq!(options.outer.len(), 3);
        assert_eq!(options.holes.len(), 1);
        assert_eq!(options.fill_color, Color::rgba(255, 0, 0, 128));
        assert_eq!(options.stroke_color, Color::BLACK);
    }

    #[test]
    fn test_polyline_width_scaled_and_spans() {
        let mut line = Polyline::new(vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)]);
        line.stroke_weight = Some(3.0);
        line.style_spans = vec![
            StyleSpan {
                color: "#00ff00".into(),
                segments: None,
            },
            StyleSpan {
                color: "#0000ff".into(),
                segments: Some(2.0),
            },
        ];

        let options = builder(2.5).build_polyline(&line).unwrap();
        assert_eq!(options.width, 7.5);
        assert_eq!(options.spans[0].segments, None);
        assert_eq!(options.spans[1].color, Color::rgba(0, 0, 255, 255));
    }

    #[test]
    fn test_ground_overlay_image_sources() {
        let builder = builder(1.0);
        let mut overlay = GroundOverlay {
            latitude: 0.0,
            longitude: 0.0,
            width: 100.0,
            height: 100.0,
            image_path: "tiles/floor.png".into(),
        };
        let options = builder.build_ground_overlay(&overlay).unwrap();
        assert_eq!(options.image, OverlayImage::Path("tiles/floor.png".into()));

        overlay.image_path = png_data_url(5, 5, [9, 9, 9, 255]);
        let options = builder.build_ground_overlay(&overlay).unwrap();
        assert!(matches!(options.image, OverlayImage::Bitmap(ref img) if img.width() == 5));
        assert!(builder.icon_cache().is_empty());

        overlay.image_path = "data:image/png;base64,AAAA".into();
        assert!(builder.build_ground_overlay(&overlay).is_err());
    }
}
