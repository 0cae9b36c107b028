//! Plugin method names mapped onto a session handle
//!
//! Arguments arrive as the JSON object the host passed to the plugin call;
//! results are returned in the shape the host expects to resolve with.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::handle::MapSessionHandle;
use crate::errors::{BridgeResult, MapError};
use crate::models::{
    BoundsPayload, CameraConfig, Circle, FrameRect, GroundOverlay, LatLngBounds, Marker, Padding,
    Polygon, Polyline, SnapshotFormat, from_args,
};
use crate::native::LifecycleEvent;

const DEFAULT_SNAPSHOT_QUALITY: u8 = 100;

/// Required argument `key`
fn arg<T: DeserializeOwned>(args: &Value, key: &str) -> BridgeResult<T> {
    match args.get(key) {
        Some(value) if !value.is_null() => from_args(value)
            .map_err(|e| MapError::invalid_arguments(format!("Invalid '{key}': {e}"))),
        _ => Err(MapError::invalid_arguments(format!(
            "Missing required argument '{key}'"
        ))),
    }
}

/// Optional argument `key`; null counts as absent
fn opt_arg<T: DeserializeOwned>(args: &Value, key: &str) -> BridgeResult<Option<T>> {
    match args.get(key) {
        Some(value) if !value.is_null() => from_args(value)
            .map(Some)
            .map_err(|e| MapError::invalid_arguments(format!("Invalid '{key}': {e}"))),
        _ => Ok(None),
    }
}

/// First of `keys` present in `args`
fn arg_any<T: DeserializeOwned>(args: &Value, keys: &[&str]) -> BridgeResult<T> {
    for key in keys {
        if let Some(value) = opt_arg(args, key)? {
            return Ok(value);
        }
    }
    Err(MapError::invalid_arguments(format!(
        "Missing required argument '{}'",
        keys.first().copied().unwrap_or_default()
    )))
}

fn ids(ids: Vec<String>) -> Value {
    json!({ "ids": ids })
}

fn id(id: String) -> Value {
    json!({ "id": id })
}

fn done() -> Value {
    json!({})
}

/// Execute one plugin call against `handle`
pub async fn dispatch(handle: &MapSessionHandle, method: &str, args: &Value) -> BridgeResult<Value> {
    debug!("Dispatching {} on map {}", method, handle.map_id());

    let result = match method {
        "addMarker" => id(handle.add_marker(arg::<Marker>(args, "marker")?).await?),
        "addMarkers" => ids(handle.add_markers(arg::<Vec<Marker>>(args, "markers")?).await?),
        "removeMarker" => {
            let marker_id: String = arg_any(args, &["markerId", "id"])?;
            handle.remove_marker(&marker_id).await?;
            done()
        }
        "removeMarkers" => {
            handle.remove_markers(arg_any(args, &["markerIds", "ids"])?).await?;
            done()
        }
        "updateMarker" => {
            let marker_id: String = arg_any(args, &["markerId", "id"])?;
            id(handle.update_marker(&marker_id, arg(args, "marker")?).await?)
        }
        "updateMarkerIcon" => {
            let marker_id: String = arg_any(args, &["markerId", "id"])?;
            handle
                .update_marker_icon(&marker_id, arg(args, "iconId")?, arg(args, "iconUrl")?)
                .await?;
            done()
        }
        "hasIcon" => {
            let icon_id: String = arg(args, "iconId")?;
            json!({ "result": handle.has_icon(&icon_id) })
        }

        "addPolygon" => id(first(handle.add_polygons(vec![arg::<Polygon>(args, "polygon")?]).await?)?),
        "addPolygons" => ids(handle.add_polygons(arg(args, "polygons")?).await?),
        "removePolygon" => {
            let polygon_id: String = arg_any(args, &["polygonId", "id"])?;
            handle.remove_polygon(&polygon_id).await?;
            done()
        }
        "removePolygons" => {
            handle.remove_polygons(arg_any(args, &["polygonIds", "ids"])?).await?;
            done()
        }
        "updatePolygon" => {
            let polygon_id: String = arg_any(args, &["polygonId", "id"])?;
            id(handle.update_polygon(&polygon_id, arg(args, "polygon")?).await?)
        }

        "addCircle" => id(first(handle.add_circles(vec![arg::<Circle>(args, "circle")?]).await?)?),
        "addCircles" => ids(handle.add_circles(arg(args, "circles")?).await?),
        "removeCircle" => {
            let circle_id: String = arg_any(args, &["circleId", "id"])?;
            handle.remove_circle(&circle_id).await?;
            done()
        }
        "removeCircles" => {
            handle.remove_circles(arg_any(args, &["circleIds", "ids"])?).await?;
            done()
        }
        "updateCircle" => {
            let circle_id: String = arg_any(args, &["circleId", "id"])?;
            id(handle.update_circle(&circle_id, arg(args, "circle")?).await?)
        }

        "addPolyline" => {
            id(first(handle.add_polylines(vec![arg::<Polyline>(args, "polyline")?]).await?)?)
        }
        "addPolylines" => ids(handle.add_polylines(arg(args, "polylines")?).await?),
        "removePolyline" => {
            let polyline_id: String = arg_any(args, &["polylineId", "id"])?;
            handle.remove_polyline(&polyline_id).await?;
            done()
        }
        "removePolylines" => {
            handle.remove_polylines(arg_any(args, &["polylineIds", "ids"])?).await?;
            done()
        }
        "updatePolyline" => {
            let polyline_id: String = arg_any(args, &["polylineId", "id"])?;
            id(handle.update_polyline(&polyline_id, arg(args, "polyline")?).await?)
        }

        "addGroundOverlay" => {
            let overlay: GroundOverlay = match args.get("overlay") {
                Some(nested) => from_args(nested)?,
                None => from_args(args)?,
            };
            id(handle.add_ground_overlay(overlay).await?)
        }
        "removeGroundOverlay" => {
            let overlay_id: String = arg_any(args, &["overlayId", "id"])?;
            handle.remove_ground_overlay(&overlay_id).await?;
            done()
        }

        "enableClustering" => {
            handle
                .enable_clustering(opt_arg(args, "minClusterSize")?)
                .await?;
            done()
        }
        "disableClustering" => {
            handle.disable_clustering().await?;
            done()
        }

        "setCamera" => {
            handle.set_camera(arg::<CameraConfig>(args, "config")?).await?;
            done()
        }
        "getCamera" => serde_json::to_value(handle.get_camera().await?)?,
        "getZoomLevel" => json!({ "zoomLevel": handle.get_zoom_level().await? }),
        "getMapBounds" | "getLatLngBounds" => {
            serde_json::to_value(BoundsPayload::from(handle.get_lat_lng_bounds().await?))?
        }
        "getScreenBounds" => serde_json::to_value(handle.get_map_bounds().await?)?,
        "fitBounds" => {
            let bounds: LatLngBounds = arg(args, "bounds")?;
            let padding: Option<i32> = opt_arg(args, "padding")?;
            handle.fit_bounds(bounds, padding.unwrap_or(0)).await?;
            done()
        }

        "getMapType" => json!({ "type": handle.get_map_type().await?.to_string() }),
        "setMapType" => {
            let map_type: String = arg(args, "mapType")?;
            handle.set_map_type(&map_type).await?;
            done()
        }
        "enableIndoorMaps" => {
            handle.enable_indoor_maps(arg(args, "enabled")?).await?;
            done()
        }
        "enableTrafficLayer" => {
            handle.enable_traffic_layer(arg(args, "enabled")?).await?;
            done()
        }
        "enableCurrentLocation" => {
            handle.enable_current_location(arg(args, "enabled")?).await?;
            done()
        }
        "setPadding" => {
            handle.set_padding(arg::<Padding>(args, "padding")?).await?;
            done()
        }
        "onResize" | "onDisplay" | "updateRender" => {
            handle.update_render(arg::<FrameRect>(args, "mapBounds")?).await?;
            done()
        }

        "takeSnapshot" => {
            let format: Option<SnapshotFormat> = opt_arg(args, "format")?;
            let quality: Option<u8> = opt_arg(args, "quality")?;
            let snapshot = handle
                .take_snapshot(
                    format.unwrap_or_default(),
                    quality.unwrap_or(DEFAULT_SNAPSHOT_QUALITY),
                )
                .await?;
            json!({ "snapshot": snapshot })
        }

        "onStart" | "onResume" | "onPause" | "onStop" | "onDestroy" => {
            let event: LifecycleEvent = method
                .parse()
                .map_err(|_| MapError::invalid_arguments(format!("Unknown lifecycle hook '{method}'")))?;
            handle.lifecycle(event).await?;
            done()
        }
        "destroy" => {
            handle.destroy().await?;
            done()
        }

        other => {
            return Err(MapError::invalid_arguments(format!(
                "Unknown method '{other}'"
            )));
        }
    };

    Ok(result)
}

fn first(mut ids: Vec<String>) -> BridgeResult<String> {
    ids.pop()
        .ok_or_else(|| MapError::internal("Overlay add produced no id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_reports_missing_and_invalid() {
        let args = json!({ "enabled": "yes", "empty": null });

        let missing = arg::<bool>(&args, "visible").unwrap_err();
        assert!(missing.to_string().contains("Missing required argument 'visible'"));

        let invalid = arg::<bool>(&args, "enabled").unwrap_err();
        assert_eq!(invalid.code(), "INVALID_ARGUMENTS");

        assert_eq!(opt_arg::<bool>(&args, "empty").unwrap(), None);
    }

    #[test]
    fn test_arg_any_prefers_first_present_key() {
        let args = json!({ "id": "m2", "markerId": "m1" });
        let id: String = arg_any(&args, &["markerId", "id"]).unwrap();
        assert_eq!(id, "m1");

        let args = json!({ "id": "m2" });
        let id: String = arg_any(&args, &["markerId", "id"]).unwrap();
        assert_eq!(id, "m2");
    }
}
