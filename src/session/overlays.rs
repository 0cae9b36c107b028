//! Overlay registry mutation and the clustering toggle
//!
//! Batches are all-or-nothing: every description is validated before the
//! native map is touched, and if the SDK rejects one entity the handles
//! already created by that batch are removed again before the error is
//! returned.

use tracing::{debug, info, warn};

use super::actor::{MapSession, ready_native};
use crate::errors::{BridgeResult, MapError, NativeError};
use crate::models::{
    Circle, Description, GroundOverlay, Marker, OverlayKind, Polygon, Polyline,
};
use crate::native::{MarkerOptions, NativeId, NativeMap};
use crate::observability::BridgeMetrics;
use crate::services::clustering::ClusterItem;
use crate::services::{ClusterCoordinator, EntityBuilder, MarkerHandle, OverlayRegistry};

fn validate_all<D: Description>(descriptions: &[D]) -> BridgeResult<()> {
    if descriptions.is_empty() {
        return Err(MapError::invalid_arguments(format!(
            "At least one {} is required",
            D::KIND
        )));
    }
    for (index, description) in descriptions.iter().enumerate() {
        description.validate().map_err(|e| match e {
            MapError::InvalidArguments { message } => {
                MapError::invalid_arguments(format!("{} at index {}: {}", D::KIND, index, message))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Attach every option set, removing the partial batch again on the first failure
fn attach_batch<O, F>(
    native: &mut dyn NativeMap,
    kind: OverlayKind,
    options: &[O],
    mut add: F,
) -> BridgeResult<Vec<NativeId>>
where
    F: FnMut(&mut dyn NativeMap, &O) -> Result<NativeId, NativeError>,
{
    let mut attached = Vec::with_capacity(options.len());
    for item in options {
        match add(&mut *native, item) {
            Ok(id) => attached.push(id),
            Err(e) => {
                for id in &attached {
                    native.remove(kind, id);
                }
                warn!(
                    "Adding {} failed after {} of {} succeeded, batch rolled back: {}",
                    kind,
                    attached.len(),
                    options.len(),
                    e
                );
                return Err(e.into());
            }
        }
    }
    Ok(attached)
}

fn register<D>(
    registry: &mut OverlayRegistry<D, NativeId>,
    descriptions: Vec<D>,
    native_ids: Vec<NativeId>,
) -> Vec<String> {
    BridgeMetrics::global().record_overlays_added(registry.kind(), native_ids.len());
    descriptions
        .into_iter()
        .zip(native_ids)
        .map(|(description, native_id)| {
            registry.insert(native_id.clone(), description, native_id.clone());
            native_id
        })
        .collect()
}

fn detach_one<D>(
    native: &mut dyn NativeMap,
    registry: &mut OverlayRegistry<D, NativeId>,
    id: &str,
) -> BridgeResult<()> {
    let kind = registry.kind();
    let entry = registry
        .remove(id)
        .ok_or_else(|| MapError::entity_not_found(kind, id))?;
    native.remove(kind, &entry.handle);
    BridgeMetrics::global().record_overlays_removed(kind, 1);
    Ok(())
}

/// Remove the known ids, skipping the rest
fn detach_many<D>(
    native: &mut dyn NativeMap,
    registry: &mut OverlayRegistry<D, NativeId>,
    ids: &[String],
) -> usize {
    let kind = registry.kind();
    let mut removed = 0;
    for id in ids {
        match registry.remove(id) {
            Some(entry) => {
                native.remove(kind, &entry.handle);
                removed += 1;
            }
            None => debug!("Skipping unknown {} {}", kind, id),
        }
    }
    BridgeMetrics::global().record_overlays_removed(kind, removed);
    removed
}

/// Build marker options off the actor; icon decoding is the expensive part
async fn build_markers(
    builder: EntityBuilder,
    markers: Vec<Marker>,
) -> BridgeResult<(Vec<Marker>, Vec<MarkerOptions>)> {
    tokio::task::spawn_blocking(move || {
        let options = markers.iter().map(|m| builder.build_marker(m)).collect();
        (markers, options)
    })
    .await
    .map_err(|e| MapError::internal(format!("Marker build task failed: {e}")))
}

/// Returns whether the clustered rendering needs refreshing
fn detach_marker(
    native: &mut dyn NativeMap,
    clustering: Option<&mut ClusterCoordinator>,
    id: &str,
    handle: MarkerHandle,
) -> bool {
    match handle {
        MarkerHandle::Attached(native_id) => {
            native.remove(OverlayKind::Marker, &native_id);
            false
        }
        MarkerHandle::Clustered => clustering
            .map(|coordinator| coordinator.remove_item(id).is_some())
            .unwrap_or(false),
    }
}

impl MapSession {
    pub async fn add_markers(&mut self, markers: Vec<Marker>) -> BridgeResult<Vec<String>> {
        validate_all(&markers)?;
        self.native()?;

        let (markers, options) = build_markers(self.builder.clone(), markers).await?;

        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let ids = attach_batch(native, OverlayKind::Marker, &options, |native, o| {
            native.add_marker(o)
        })?;

        for ((marker, options), native_id) in markers.into_iter().zip(options).zip(&ids) {
            let handle = match self.clustering.as_mut() {
                Some(coordinator) => {
                    native.remove(OverlayKind::Marker, native_id);
                    coordinator.add_item(native_id.clone(), ClusterItem::new(options));
                    MarkerHandle::Clustered
                }
                None => MarkerHandle::Attached(native_id.clone()),
            };
            self.markers.insert(native_id.clone(), marker, handle);
        }
        BridgeMetrics::global().record_overlays_added(OverlayKind::Marker, ids.len());

        if self.clustering.is_some() {
            self.recluster();
        }
        debug!("Added {} markers to map {}", ids.len(), self.map_id);
        Ok(ids)
    }

    pub fn remove_marker(&mut self, id: &str) -> BridgeResult<()> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let entry = self
            .markers
            .remove(id)
            .ok_or_else(|| MapError::entity_not_found(OverlayKind::Marker, id))?;
        let refresh = detach_marker(native, self.clustering.as_mut(), id, entry.handle);
        BridgeMetrics::global().record_overlays_removed(OverlayKind::Marker, 1);
        if refresh {
            self.recluster();
        }
        Ok(())
    }

    pub fn remove_markers(&mut self, ids: &[String]) -> BridgeResult<usize> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let mut removed = 0;
        let mut refresh = false;
        for id in ids {
            match self.markers.remove(id) {
                Some(entry) => {
                    refresh |= detach_marker(native, self.clustering.as_mut(), id, entry.handle);
                    removed += 1;
                }
                None => debug!("Skipping unknown marker {}", id),
            }
        }
        BridgeMetrics::global().record_overlays_removed(OverlayKind::Marker, removed);
        if refresh {
            self.recluster();
        }
        Ok(removed)
    }

    /// Replace a marker; the replacement gets a fresh id
    pub async fn update_marker(&mut self, id: &str, marker: Marker) -> BridgeResult<String> {
        marker.validate()?;
        self.native()?;
        self.remove_marker(id)?;
        let mut ids = self.add_markers(vec![marker]).await?;
        ids.pop()
            .ok_or_else(|| MapError::internal("Marker update produced no id"))
    }

    /// Swap a marker's icon in place, clustered or not
    pub async fn update_marker_icon(
        &mut self,
        id: &str,
        icon_id: String,
        icon_url: String,
    ) -> BridgeResult<()> {
        self.native()?;
        if icon_id.is_empty() {
            debug!("Ignoring icon update without an icon id for marker {}", id);
            return Ok(());
        }
        let mut marker = self
            .markers
            .get(id)
            .map(|entry| entry.description.clone())
            .ok_or_else(|| MapError::entity_not_found(OverlayKind::Marker, id))?;
        marker.icon_id = Some(icon_id);
        marker.icon_url = Some(icon_url);

        let builder = self.builder.clone();
        let (marker, icon) = tokio::task::spawn_blocking(move || {
            let icon = builder.resolve_icon(&marker);
            (marker, icon)
        })
        .await
        .map_err(|e| MapError::internal(format!("Icon decode task failed: {e}")))?;

        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let handle = self
            .markers
            .get(id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| MapError::entity_not_found(OverlayKind::Marker, id))?;

        let mut refresh = false;
        match handle {
            MarkerHandle::Attached(native_id) => native.set_marker_icon(&native_id, &icon)?,
            MarkerHandle::Clustered => {
                if let Some(item) = self.clustering.as_mut().and_then(|c| c.item_mut(id)) {
                    item.options.icon = icon;
                    refresh = true;
                }
            }
        }
        if let Some(description) = self.markers.description_mut(id) {
            *description = marker;
        }
        if refresh {
            self.recluster();
        }
        Ok(())
    }

    pub fn add_polygons(&mut self, polygons: Vec<Polygon>) -> BridgeResult<Vec<String>> {
        validate_all(&polygons)?;
        self.native()?;
        let options = polygons
            .iter()
            .map(|p| self.builder.build_polygon(p))
            .collect::<BridgeResult<Vec<_>>>()?;

        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let ids = attach_batch(native, OverlayKind::Polygon, &options, |native, o| {
            native.add_polygon(o)
        })?;
        Ok(register(&mut self.polygons, polygons, ids))
    }

    pub fn remove_polygon(&mut self, id: &str) -> BridgeResult<()> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        detach_one(native, &mut self.polygons, id)
    }

    pub fn remove_polygons(&mut self, ids: &[String]) -> BridgeResult<usize> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        Ok(detach_many(native, &mut self.polygons, ids))
    }

    pub fn update_polygon(&mut self, id: &str, polygon: Polygon) -> BridgeResult<String> {
        polygon.validate()?;
        self.remove_polygon(id)?;
        first_id(self.add_polygons(vec![polygon])?)
    }

    pub fn add_circles(&mut self, circles: Vec<Circle>) -> BridgeResult<Vec<String>> {
        validate_all(&circles)?;
        self.native()?;
        let options = circles
            .iter()
            .map(|c| self.builder.build_circle(c))
            .collect::<BridgeResult<Vec<_>>>()?;

        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let ids = attach_batch(native, OverlayKind::Circle, &options, |native, o| {
            native.add_circle(o)
        })?;
        Ok(register(&mut self.circles, circles, ids))
    }

    pub fn remove_circle(&mut self, id: &str) -> BridgeResult<()> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        detach_one(native, &mut self.circles, id)
    }

    pub fn remove_circles(&mut self, ids: &[String]) -> BridgeResult<usize> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        Ok(detach_many(native, &mut self.circles, ids))
    }

    pub fn update_circle(&mut self, id: &str, circle: Circle) -> BridgeResult<String> {
        circle.validate()?;
        self.remove_circle(id)?;
        first_id(self.add_circles(vec![circle])?)
    }

    pub fn add_polylines(&mut self, polylines: Vec<Polyline>) -> BridgeResult<Vec<String>> {
        validate_all(&polylines)?;
        self.native()?;
        let options = polylines
            .iter()
            .map(|l| self.builder.build_polyline(l))
            .collect::<BridgeResult<Vec<_>>>()?;

        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let ids = attach_batch(native, OverlayKind::Polyline, &options, |native, o| {
            native.add_polyline(o)
        })?;
        Ok(register(&mut self.polylines, polylines, ids))
    }

    pub fn remove_polyline(&mut self, id: &str) -> BridgeResult<()> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        detach_one(native, &mut self.polylines, id)
    }

    pub fn remove_polylines(&mut self, ids: &[String]) -> BridgeResult<usize> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        Ok(detach_many(native, &mut self.polylines, ids))
    }

    pub fn update_polyline(&mut self, id: &str, polyline: Polyline) -> BridgeResult<String> {
        polyline.validate()?;
        self.remove_polyline(id)?;
        first_id(self.add_polylines(vec![polyline])?)
    }

    pub async fn add_ground_overlay(&mut self, overlay: GroundOverlay) -> BridgeResult<String> {
        overlay.validate()?;
        self.native()?;

        let builder = self.builder.clone();
        let (overlay, options) = tokio::task::spawn_blocking(move || {
            let options = builder.build_ground_overlay(&overlay);
            (overlay, options)
        })
        .await
        .map_err(|e| MapError::internal(format!("Ground overlay build task failed: {e}")))?;
        let options = options?;

        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let ids = attach_batch(native, OverlayKind::GroundOverlay, &[options], |native, o| {
            native.add_ground_overlay(o)
        })?;
        first_id(register(&mut self.ground_overlays, vec![overlay], ids))
    }

    pub fn remove_ground_overlay(&mut self, id: &str) -> BridgeResult<()> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        detach_one(native, &mut self.ground_overlays, id)
    }

    /// Hand every marker to a coordinator, or retune the live one
    pub async fn enable_clustering(&mut self, min_cluster_size: Option<usize>) -> BridgeResult<()> {
        self.native()?;
        let min_cluster_size =
            min_cluster_size.unwrap_or(self.session_config.default_min_cluster_size);

        if let Some(coordinator) = self.clustering.as_mut() {
            coordinator.set_min_cluster_size(min_cluster_size);
            self.recluster();
            return Ok(());
        }

        let (ids, markers): (Vec<String>, Vec<Marker>) = self
            .markers
            .iter()
            .map(|(id, entry)| (id.clone(), entry.description.clone()))
            .unzip();
        let (_, options) = build_markers(self.builder.clone(), markers).await?;

        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let mut coordinator =
            ClusterCoordinator::new(min_cluster_size, self.session_config.cluster_max_distance_px);
        for (id, options) in ids.into_iter().zip(options) {
            if let Some(MarkerHandle::Attached(native_id)) =
                self.markers.replace_handle(&id, MarkerHandle::Clustered)
            {
                native.remove(OverlayKind::Marker, &native_id);
            }
            coordinator.add_item(id, ClusterItem::new(options));
        }

        info!(
            "Clustering enabled on map {} ({} markers, min cluster size {})",
            self.map_id,
            coordinator.len(),
            min_cluster_size
        );
        self.clustering = Some(coordinator);
        self.recluster();
        Ok(())
    }

    /// Tear down the coordinator and re-attach every marker individually
    pub fn disable_clustering(&mut self) -> BridgeResult<()> {
        let native = ready_native(self.state, &mut self.native, &self.map_id)?;
        let Some(mut coordinator) = self.clustering.take() else {
            return Ok(());
        };
        self.debouncer.cancel();

        let (ids, options): (Vec<String>, Vec<MarkerOptions>) = self
            .markers
            .iter()
            .filter_map(|(id, _)| match coordinator.item(id) {
                Some(item) => Some((id.clone(), item.options.clone())),
                None => {
                    warn!("Marker {} missing from the cluster coordinator", id);
                    None
                }
            })
            .unzip();

        coordinator.clear_render(native);
        match attach_batch(native, OverlayKind::Marker, &options, |native, o| {
            native.add_marker(o)
        }) {
            Ok(native_ids) => {
                for (id, native_id) in ids.iter().zip(native_ids) {
                    self.markers
                        .replace_handle(id, MarkerHandle::Attached(native_id));
                }
                info!("Clustering disabled on map {} ({} markers re-attached)", self.map_id, ids.len());
                Ok(())
            }
            Err(e) => {
                let zoom = native.camera_position().zoom;
                coordinator.recluster(zoom, native);
                self.clustering = Some(coordinator);
                Err(e)
            }
        }
    }

    pub fn clustering_enabled(&self) -> bool {
        self.clustering.is_some()
    }

    /// Re-render clusters at the current zoom
    pub(super) fn recluster(&mut self) {
        let (Some(coordinator), Some(native)) =
            (self.clustering.as_mut(), self.native.as_deref_mut())
        else {
            return;
        };
        let zoom = native.camera_position().zoom;
        coordinator.recluster(zoom, native);
        BridgeMetrics::global().record_recluster();
    }

    /// Restart the debounce timer; only the last move in a burst reclusters
    pub(super) fn schedule_recluster(&mut self) {
        if self.clustering.is_none() {
            return;
        }
        let tx = self.recluster_tx.clone();
        self.debouncer.trigger(move |generation| {
            let _ = tx.send(generation);
        });
    }

    pub(super) fn on_recluster_timer(&mut self, generation: u64) {
        if self.debouncer.complete(generation) {
            self.recluster();
        }
    }

    pub fn overlay_ids(&self, kind: OverlayKind) -> Vec<String> {
        match kind {
            OverlayKind::Marker => self.markers.ids(),
            OverlayKind::Polygon => self.polygons.ids(),
            OverlayKind::Circle => self.circles.ids(),
            OverlayKind::Polyline => self.polylines.ids(),
            OverlayKind::GroundOverlay => self.ground_overlays.ids(),
        }
    }

    pub fn marker(&self, id: &str) -> Option<Marker> {
        self.markers.get(id).map(|entry| entry.description.clone())
    }
}

fn first_id(mut ids: Vec<String>) -> BridgeResult<String> {
    ids.pop()
        .ok_or_else(|| MapError::internal("Overlay add produced no id"))
}
