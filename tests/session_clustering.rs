mod common;

use std::time::Duration;

use common::{Harness, marker, names, nearby_markers};
use map_bridge::models::{EventName, EventPayload, OverlayKind};
use map_bridge::native::NativeEvent;

#[tokio::test]
async fn test_clustering_toggle_round_trip_preserves_markers() {
    let harness = Harness::new();
    let (map, probe) = harness.map("toggle").await;

    let mut markers = nearby_markers(5);
    markers.push(marker(-30.0, 120.0).with_title("far"));
    map.add_markers(markers).await.unwrap();

    let ids = map.overlay_ids(OverlayKind::Marker).await.unwrap();
    let mut descriptions = Vec::new();
    for id in &ids {
        descriptions.push(map.marker(id).await.unwrap().unwrap());
    }

    map.enable_clustering(Some(2)).await.unwrap();
    assert!(map.clustering_enabled().await.unwrap());
    assert!(probe.attached_ids(OverlayKind::Marker).is_empty());
    let clusters = probe.rendered_clusters();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].size(), 5);
    assert_eq!(probe.rendered_singletons().len(), 1);

    map.disable_clustering().await.unwrap();
    assert!(!map.clustering_enabled().await.unwrap());
    assert!(probe.rendered_clusters().is_empty());
    assert_eq!(probe.attached_ids(OverlayKind::Marker).len(), 6);

    assert_eq!(map.overlay_ids(OverlayKind::Marker).await.unwrap(), ids);
    for (id, description) in ids.iter().zip(&descriptions) {
        assert_eq!(&map.marker(id).await.unwrap().unwrap(), description);
    }

    // Native handles are regenerated on re-attach; registry ids are not
    let native_id = probe.attached_ids(OverlayKind::Marker)[0].clone();
    assert!(!ids.contains(&native_id));
}

#[tokio::test]
async fn test_markers_added_while_clustering_go_to_the_coordinator() {
    let harness = Harness::new();
    let (map, probe) = harness.map("cluster-add").await;

    map.enable_clustering(Some(3)).await.unwrap();
    let ids = map.add_markers(nearby_markers(4)).await.unwrap();

    assert!(probe.attached_ids(OverlayKind::Marker).is_empty());
    let clusters = probe.rendered_clusters();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].members, ids);

    map.remove_marker(&ids[0]).await.unwrap();
    assert_eq!(probe.rendered_clusters()[0].size(), 3);

    map.enable_clustering(Some(10)).await.unwrap();
    assert!(probe.rendered_clusters().is_empty());
    assert_eq!(probe.rendered_singletons().len(), 3);
}

#[tokio::test]
async fn test_cluster_click_reports_members() {
    let mut harness = Harness::new();
    let (map, probe) = harness.map("cluster-click").await;

    map.add_markers(nearby_markers(3)).await.unwrap();
    map.enable_clustering(Some(2)).await.unwrap();
    harness.drain_events().await;

    let cluster = probe.rendered_clusters().remove(0);
    probe.emit(NativeEvent::ClusterClick(cluster.id));
    probe.emit(NativeEvent::ClusterItemClick(cluster.members[1].clone()));

    let events = harness.drain_events().await;
    assert_eq!(names(&events), vec![EventName::OnClusterClick, EventName::OnMarkerClick]);

    match &events[0].payload {
        EventPayload::Cluster(payload) => {
            assert_eq!(payload.size, 3);
            assert_eq!(payload.items.len(), 3);
            assert_eq!(payload.items[0].title.as_deref(), Some("near 0"));
        }
        other => panic!("expected a cluster payload, got {other:?}"),
    }
    match &events[1].payload {
        EventPayload::Marker(payload) => assert_eq!(payload.marker_id, cluster.members[1]),
        other => panic!("expected a marker payload, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_camera_move_burst_reclusters_once() {
    let harness = Harness::new();
    let (map, probe) = harness.map("debounce").await;

    map.add_markers(nearby_markers(4)).await.unwrap();
    map.enable_clustering(None).await.unwrap();
    let renders = probe.cluster_render_count();

    for _ in 0..10 {
        probe.emit(NativeEvent::CameraMove);
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    // Still inside the quiet period of the last move
    assert_eq!(probe.cluster_render_count(), renders);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.cluster_render_count(), renders + 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(probe.cluster_render_count(), renders + 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabling_clustering_cancels_pending_recluster() {
    let harness = Harness::new();
    let (map, probe) = harness.map("debounce-cancel").await;

    map.add_markers(nearby_markers(4)).await.unwrap();
    map.enable_clustering(None).await.unwrap();

    probe.emit(NativeEvent::CameraMove);
    tokio::time::sleep(Duration::from_millis(10)).await;
    map.disable_clustering().await.unwrap();
    let renders = probe.cluster_render_count();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.cluster_render_count(), renders);
    assert_eq!(probe.attached_ids(OverlayKind::Marker).len(), 4);
}
