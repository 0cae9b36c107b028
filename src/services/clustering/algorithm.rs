//! Non-hierarchical distance-based grouping
//!
//! Points are projected onto the unit Web Mercator square. Each unclaimed
//! point, in key order, claims every other unclaimed point within a square
//! of side `max_distance_px` screen pixels at the current integer zoom.

use std::f64::consts::PI;

use crate::models::LatLng;

/// Tile size in pixels at zoom 0
const WORLD_TILE_PX: f64 = 256.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

#[derive(Debug, Clone, Copy, PartialEq)]
struct WorldPoint {
    x: f64,
    y: f64,
}

fn project(position: &LatLng) -> WorldPoint {
    let lat = position.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let sin_lat = lat.to_radians().sin();
    WorldPoint {
        x: position.lng / 360.0 + 0.5,
        y: 0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI),
    }
}

/// Side of the grouping square in world units at `zoom`
pub fn zoom_span(max_distance_px: f64, zoom: f64) -> f64 {
    let discrete_zoom = zoom.max(0.0).floor();
    max_distance_px / 2f64.powf(discrete_zoom) / WORLD_TILE_PX
}

/// One group of keys and the mean of their positions
#[derive(Debug, Clone, PartialEq)]
pub struct Group<K> {
    pub members: Vec<K>,
    pub centroid: LatLng,
}

/// Partition `items` into groups; a lone point forms a group of one
pub fn group_by_distance<K: Clone>(items: &[(K, LatLng)], zoom: f64, max_distance_px: f64) -> Vec<Group<K>> {
    let half_span = zoom_span(max_distance_px, zoom) / 2.0;
    let projected: Vec<WorldPoint> = items.iter().map(|(_, p)| project(p)).collect();
    let mut claimed = vec![false; items.len()];
    let mut groups = Vec::new();

    for seed in 0..items.len() {
        if claimed[seed] {
            continue;
        }
        let origin = projected[seed];
        let mut member_indices = Vec::new();
        for (index, point) in projected.iter().enumerate() {
            if claimed[index] {
                continue;
            }
            if (point.x - origin.x).abs() <= half_span && (point.y - origin.y).abs() <= half_span {
                claimed[index] = true;
                member_indices.push(index);
            }
        }

        let count = member_indices.len() as f64;
        let (lat_sum, lng_sum) = member_indices.iter().fold((0.0, 0.0), |(lat, lng), &i| {
            (lat + items[i].1.lat, lng + items[i].1.lng)
        });
        groups.push(Group {
            members: member_indices.iter().map(|&i| items[i].0.clone()).collect(),
            centroid: LatLng::new(lat_sum / count, lng_sum / count),
        });
    }

    groups
}
