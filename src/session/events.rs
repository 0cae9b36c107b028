//! Translation of SDK callbacks into host events

use tracing::{debug, trace};

use super::SessionState;
use super::actor::MapSession;
use crate::models::{
    BoundsPayload, CameraIdlePayload, CameraMoveStartedPayload, CirclePayload, EventName,
    EventPayload, LatLng, MapEvent, MarkerPayload, PointPayload, PolygonPayload, PolylinePayload,
    ZoomChangedPayload,
};
use crate::native::{NativeEvent, REASON_GESTURE};
use crate::services::clustering::ClusterId;

impl MapSession {
    pub(super) fn handle_native_event(&mut self, event: NativeEvent) {
        if self.state == SessionState::Destroyed {
            trace!("Dropping {:?} for destroyed map {}", event, self.map_id);
            return;
        }

        match event {
            NativeEvent::MapLoaded => {
                self.notify(MapEvent::bare(EventName::OnMapLoaded, self.map_id.clone()))
            }
            NativeEvent::MapClick(point) => self.notify_point(EventName::OnMapClick, point),
            NativeEvent::MapLongClick(point) => self.notify_point(EventName::OnMapLongClick, point),
            NativeEvent::MyLocationButtonClick => self.notify(MapEvent::bare(
                EventName::OnMyLocationButtonClick,
                self.map_id.clone(),
            )),
            NativeEvent::MyLocationClick(point) => {
                self.notify_point(EventName::OnMyLocationClick, point)
            }

            NativeEvent::MarkerClick(native_id) => {
                self.notify_marker_by_native(EventName::OnMarkerClick, &native_id)
            }
            NativeEvent::InfoWindowClick(native_id) => {
                self.notify_marker_by_native(EventName::OnInfoWindowClick, &native_id)
            }
            NativeEvent::MarkerDragStart { id, position } => {
                self.marker_dragged(EventName::OnMarkerDragStart, &id, position)
            }
            NativeEvent::MarkerDrag { id, position } => {
                self.marker_dragged(EventName::OnMarkerDrag, &id, position)
            }
            NativeEvent::MarkerDragEnd { id, position } => {
                self.marker_dragged(EventName::OnMarkerDragEnd, &id, position)
            }

            NativeEvent::PolygonClick(native_id) => {
                let Some(id) = self.polygons.id_for_native(&native_id) else {
                    debug!("Click on untracked polygon {}", native_id);
                    return;
                };
                let payload = PolygonPayload {
                    polygon_id: id.to_string(),
                    tag: self.polygons.get(id).and_then(|e| e.description.tag.clone()),
                };
                self.notify(self.event(EventName::OnPolygonClick, EventPayload::Polygon(payload)));
            }
            NativeEvent::PolylineClick(native_id) => {
                let Some(id) = self.polylines.id_for_native(&native_id) else {
                    debug!("Click on untracked polyline {}", native_id);
                    return;
                };
                let payload = PolylinePayload {
                    polyline_id: id.to_string(),
                    tag: self.polylines.get(id).and_then(|e| e.description.tag.clone()),
                };
                self.notify(self.event(EventName::OnPolylineClick, EventPayload::Polyline(payload)));
            }
            NativeEvent::CircleClick(native_id) => {
                let Some(entry) = self
                    .circles
                    .id_for_native(&native_id)
                    .and_then(|id| self.circles.get(id).map(|entry| (id, entry)))
                else {
                    debug!("Click on untracked circle {}", native_id);
                    return;
                };
                let (id, entry) = entry;
                let payload = CirclePayload {
                    circle_id: id.to_string(),
                    tag: entry.description.tag.clone(),
                    latitude: entry.description.center.lat,
                    longitude: entry.description.center.lng,
                    radius: entry.description.radius,
                };
                self.notify(self.event(EventName::OnCircleClick, EventPayload::Circle(payload)));
            }

            NativeEvent::CameraMoveStarted { reason } => {
                let payload = CameraMoveStartedPayload {
                    is_gesture: reason == REASON_GESTURE,
                };
                self.notify(self.event(
                    EventName::OnCameraMoveStarted,
                    EventPayload::CameraMoveStarted(payload),
                ));
            }
            NativeEvent::CameraMove => self.schedule_recluster(),
            NativeEvent::CameraIdle => self.camera_idle(),

            NativeEvent::ClusterClick(cluster_id) => {
                self.notify_cluster(EventName::OnClusterClick, cluster_id)
            }
            NativeEvent::ClusterInfoWindowClick(cluster_id) => {
                self.notify_cluster(EventName::OnClusterInfoWindowClick, cluster_id)
            }
            NativeEvent::ClusterItemClick(marker_id) => {
                self.notify_marker(EventName::OnMarkerClick, &marker_id)
            }
            NativeEvent::ClusterItemInfoWindowClick(marker_id) => {
                self.notify_marker(EventName::OnInfoWindowClick, &marker_id)
            }
        }
    }

    fn notify_point(&self, name: EventName, point: LatLng) {
        self.notify(self.event(name, EventPayload::Point(PointPayload::from(point))));
    }

    fn marker_payload(&self, marker_id: &str) -> Option<MarkerPayload> {
        let entry = self.markers.get(marker_id)?;
        Some(MarkerPayload {
            marker_id: marker_id.to_string(),
            latitude: entry.description.coordinate.lat,
            longitude: entry.description.coordinate.lng,
            title: entry.description.title.clone(),
            snippet: entry.description.snippet.clone(),
        })
    }

    fn notify_marker(&self, name: EventName, marker_id: &str) {
        match self.marker_payload(marker_id) {
            Some(payload) => self.notify(self.event(name, EventPayload::Marker(payload))),
            None => debug!("{} for untracked marker {}", name, marker_id),
        }
    }

    fn notify_marker_by_native(&self, name: EventName, native_id: &str) {
        match self.markers.id_for_native(native_id) {
            Some(marker_id) => self.notify_marker(name, marker_id),
            None => debug!("{} for untracked native marker {}", name, native_id),
        }
    }

    /// Keep the stored geometry in step with the drag before reporting it
    fn marker_dragged(&mut self, name: EventName, native_id: &str, position: LatLng) {
        let Some(marker_id) = self.markers.id_for_native(native_id).map(str::to_string) else {
            debug!("{} for untracked native marker {}", name, native_id);
            return;
        };
        if let Some(description) = self.markers.description_mut(&marker_id) {
            description.coordinate = position;
        }
        if let Some(coordinator) = self.clustering.as_mut() {
            coordinator.set_position(&marker_id, position);
        }
        self.notify_marker(name, &marker_id);
    }

    fn notify_cluster(&self, name: EventName, cluster_id: ClusterId) {
        let Some(payload) = self.clustering.as_ref().and_then(|c| c.describe(cluster_id)) else {
            debug!("{} for unknown cluster {}", name, cluster_id);
            return;
        };
        self.notify(self.event(name, EventPayload::Cluster(payload)));
    }

    /// `onCameraIdle` and `onBoundsChanged` share a payload; zoom is reported only on change
    fn camera_idle(&mut self) {
        let Some(native) = self.native.as_deref() else {
            return;
        };
        let camera = native.camera_position();
        let payload = CameraIdlePayload {
            bounds: native.visible_region().map(BoundsPayload::from),
            bearing: camera.bearing,
            latitude: camera.target.lat,
            longitude: camera.target.lng,
            tilt: camera.tilt,
            zoom: camera.zoom,
        };

        self.notify(self.event(EventName::OnCameraIdle, EventPayload::CameraIdle(payload.clone())));
        self.notify(self.event(EventName::OnBoundsChanged, EventPayload::CameraIdle(payload)));

        if self.last_zoom != Some(camera.zoom) {
            self.last_zoom = Some(camera.zoom);
            self.notify(self.event(
                EventName::OnZoomChanged,
                EventPayload::ZoomChanged(ZoomChangedPayload {
                    zoom_level: camera.zoom,
                }),
            ));
        }
    }
}
