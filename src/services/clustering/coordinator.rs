use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::algorithm::group_by_distance;
use super::{ClusterId, ClusterState, RenderedCluster, SingletonMarker};
use crate::models::{ClusterPayload, LatLng, MarkerPayload};
use crate::native::{MarkerOptions, NativeMap};

/// A marker handed to the coordinator for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterItem {
    pub options: MarkerOptions,
}

impl ClusterItem {
    pub fn new(options: MarkerOptions) -> Self {
        Self { options }
    }

    pub fn position(&self) -> LatLng {
        self.options.position
    }
}

/// Owns marker rendering while clustering is enabled
///
/// Items are keyed by marker id. Every [`recluster`](Self::recluster) rebuilds
/// the partition from scratch under a new generation, so cluster ids handed out
/// by an earlier pass are recognisably stale.
#[derive(Debug)]
pub struct ClusterCoordinator {
    items: BTreeMap<String, ClusterItem>,
    min_cluster_size: usize,
    max_distance_px: f64,
    state: ClusterState,
}

impl ClusterCoordinator {
    pub fn new(min_cluster_size: usize, max_distance_px: f64) -> Self {
        Self {
            items: BTreeMap::new(),
            min_cluster_size: min_cluster_size.max(1),
            max_distance_px,
            state: ClusterState::default(),
        }
    }

    pub fn min_cluster_size(&self) -> usize {
        self.min_cluster_size
    }

    pub fn set_min_cluster_size(&mut self, min_cluster_size: usize) {
        self.min_cluster_size = min_cluster_size.max(1);
    }

    pub fn add_item(&mut self, marker_id: String, item: ClusterItem) {
        self.items.insert(marker_id, item);
    }

    pub fn remove_item(&mut self, marker_id: &str) -> Option<ClusterItem> {
        self.items.remove(marker_id)
    }

    pub fn contains(&self, marker_id: &str) -> bool {
        self.items.contains_key(marker_id)
    }

    pub fn item(&self, marker_id: &str) -> Option<&ClusterItem> {
        self.items.get(marker_id)
    }

    pub fn item_mut(&mut self, marker_id: &str) -> Option<&mut ClusterItem> {
        self.items.get_mut(marker_id)
    }

    pub fn set_position(&mut self, marker_id: &str, position: LatLng) {
        if let Some(item) = self.items.get_mut(marker_id) {
            item.options.position = position;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    /// Rebuild the partition at `zoom` and push it to the native renderer
    pub fn recluster(&mut self, zoom: f64, native: &mut dyn NativeMap) -> &ClusterState {
        let positions: Vec<(String, LatLng)> = self
            .items
            .iter()
            .map(|(id, item)| (id.clone(), item.position()))
            .collect();
        let generation = self.state.generation + 1;

        let mut clusters = Vec::new();
        let mut singletons = Vec::new();
        for group in group_by_distance(&positions, zoom, self.max_distance_px) {
            if group.members.len() >= self.min_cluster_size && group.members.len() > 1 {
                clusters.push(RenderedCluster {
                    id: ClusterId {
                        generation,
                        index: clusters.len(),
                    },
                    position: group.centroid,
                    members: group.members,
                });
            } else {
                singletons.extend(group.members);
            }
        }

        self.state = ClusterState {
            generation,
            zoom,
            clusters,
            singletons,
        };

        let rendered: Vec<SingletonMarker> = self
            .state
            .singletons
            .iter()
            .filter_map(|id| {
                self.items.get(id).map(|item| SingletonMarker {
                    marker_id: id.clone(),
                    options: item.options.clone(),
                })
            })
            .collect();
        native.render_clusters(&self.state.clusters, &rendered);

        debug!(
            "Reclustered {} items at zoom {:.2}: {} clusters, {} singletons",
            self.items.len(),
            zoom,
            self.state.clusters.len(),
            self.state.singletons.len()
        );
        &self.state
    }

    /// Remove everything the renderer drew
    pub fn clear_render(&mut self, native: &mut dyn NativeMap) {
        self.state = ClusterState {
            generation: self.state.generation + 1,
            ..ClusterState::default()
        };
        native.render_clusters(&[], &[]);
    }

    /// Host payload for a cluster from the current generation
    pub fn describe(&self, id: ClusterId) -> Option<ClusterPayload> {
        if id.generation != self.state.generation {
            warn!("Ignoring stale cluster {} (current generation {})", id, self.state.generation);
            return None;
        }
        let cluster = self.state.clusters.get(id.index)?;
        let items = cluster
            .members
            .iter()
            .filter_map(|marker_id| self.item_payload(marker_id))
            .collect();
        Some(ClusterPayload {
            latitude: cluster.position.lat,
            longitude: cluster.position.lng,
            size: cluster.members.len(),
            items,
        })
    }

    pub fn item_payload(&self, marker_id: &str) -> Option<MarkerPayload> {
        let item = self.items.get(marker_id)?;
        Some(MarkerPayload {
            marker_id: marker_id.to_string(),
            latitude: item.options.position.lat,
            longitude: item.options.position.lng,
            title: item.options.title.clone(),
            snippet: item.options.snippet.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{MarkerIcon, MarkerOptions, SimulatedBackend};

    fn options(lat: f64, lng: f64, title: &str) -> MarkerOptions {
        MarkerOptions {
            position: LatLng::new(lat, lng),
            title: Some(title.to_string()),
            snippet: None,
            alpha: 1.0,
            flat: false,
            draggable: false,
            z_index: 0.0,
            anchor: None,
            icon: MarkerIcon::Default,
        }
    }

    fn coordinator_with_items(min: usize) -> ClusterCoordinator {
        let mut coordinator = ClusterCoordinator::new(min, 100.0);
        coordinator.add_item("m1".into(), ClusterItem::new(options(10.000, 10.000, "one")));
        coordinator.add_item("m2".into(), ClusterItem::new(options(10.001, 10.001, "two")));
        coordinator.add_item("m3".into(), ClusterItem::new(options(10.002, 10.000, "three")));
        coordinator.add_item("m4".into(), ClusterItem::new(options(-30.0, 120.0, "far")));
        coordinator
    }

    #[test]
    fn test_min_cluster_size_controls_rendering() {
        let mut native = SimulatedBackend::default().detached_map();

        let mut coordinator = coordinator_with_items(3);
        let state = coordinator.recluster(4.0, native.as_mut());
        assert_eq!(state.clusters.len(), 1);
        assert_eq!(state.clusters[0].members, vec!["m1", "m2", "m3"]);
        assert_eq!(state.singletons, vec!["m4"]);

        coordinator.set_min_cluster_size(4);
        let state = coordinator.recluster(4.0, native.as_mut());
        assert!(state.clusters.is_empty());
        assert_eq!(state.singletons.len(), 4);
    }

    #[test]
    fn test_describe_flattens_members() {
        let mut native = SimulatedBackend::default().detached_map();
        let mut coordinator = coordinator_with_items(2);
        let cluster_id = coordinator.recluster(4.0, native.as_mut()).clusters[0].id;

        let payload = coordinator.describe(cluster_id).unwrap();
        assert_eq!(payload.size, 3);
        assert_eq!(payload.items.len(), 3);
        assert_eq!(payload.items[0].marker_id, "m1");
        assert_eq!(payload.items[1].title.as_deref(), Some("two"));
        assert!((payload.latitude - 10.001).abs() < 1e-9);
    }

    #[test]
    fn test_stale_cluster_ids_are_ignored() {
        let mut native = SimulatedBackend::default().detached_map();
        let mut coordinator = coordinator_with_items(2);
        let stale = coordinator.recluster(4.0, native.as_mut()).clusters[0].id;
        coordinator.recluster(4.0, native.as_mut());
        assert!(coordinator.describe(stale).is_none());
    }

    #[test]
    fn test_remove_item() {
        let mut coordinator = coordinator_with_items(2);
        assert!(coordinator.remove_item("m2").is_some());
        assert!(coordinator.remove_item("m2").is_none());
        assert_eq!(coordinator.len(), 3);
        assert!(!coordinator.contains("m2"));
    }
}
