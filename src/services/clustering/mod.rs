//! Marker clustering
//!
//! While enabled, the [`ClusterCoordinator`] owns marker rendering: markers have
//! no directly attached native handle and are drawn by the native cluster
//! renderer as either clusters or singletons.

use std::fmt;

use serde::Serialize;

use crate::models::LatLng;
use crate::native::MarkerOptions;

pub mod algorithm;
pub mod coordinator;

pub use coordinator::{ClusterCoordinator, ClusterItem};

/// Identifies a cluster within one reclustering pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClusterId {
    pub generation: u64,
    pub index: usize,
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.generation, self.index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCluster {
    pub id: ClusterId,
    /// Mean position of the members
    pub position: LatLng,
    pub members: Vec<String>,
}

impl RenderedCluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// A clustered marker the renderer draws on its own
#[derive(Debug, Clone, PartialEq)]
pub struct SingletonMarker {
    pub marker_id: String,
    pub options: MarkerOptions,
}

/// Partition of clustered markers produced by one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterState {
    pub generation: u64,
    pub zoom: f64,
    pub clusters: Vec<RenderedCluster>,
    pub singletons: Vec<String>,
}
