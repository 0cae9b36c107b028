mod common;

use common::{Harness, marker, names};
use map_bridge::models::{
    CameraConfig, CameraPosition, EventName, EventPayload, FrameRect, LatLng, LatLngBounds,
    MapType, Padding, SnapshotFormat,
};
use map_bridge::native::{NativeEvent, SnapshotBehaviour};

#[tokio::test]
async fn test_zoom_only_camera_keeps_target() {
    let harness = Harness::new();
    let (map, probe) = harness.map("zoom-only").await;

    map.set_camera(CameraConfig::zoom(12.0)).await.unwrap();

    let camera = map.get_camera().await.unwrap();
    assert_eq!(camera.target, LatLng::new(51.5, -0.12));
    assert_eq!(camera.zoom, 12.0);
    assert_eq!(map.get_zoom_level().await.unwrap(), 12.0);
    assert_eq!(probe.camera(), camera);
}

#[tokio::test]
async fn test_camera_idle_reports_zoom_only_on_change() {
    let mut harness = Harness::new();
    let (_map, probe) = harness.map("idle").await;
    harness.drain_events().await;

    probe.pan_to(CameraPosition::new(LatLng::new(40.0, -74.0), 8.0));
    let events = harness.drain_events().await;
    assert_eq!(
        names(&events),
        vec![
            EventName::OnCameraMoveStarted,
            EventName::OnCameraIdle,
            EventName::OnBoundsChanged,
            EventName::OnZoomChanged,
        ]
    );
    match &events[0].payload {
        EventPayload::CameraMoveStarted(payload) => assert!(payload.is_gesture),
        other => panic!("expected a move-started payload, got {other:?}"),
    }
    assert_eq!(events[1].payload, events[2].payload);
    match &events[1].payload {
        EventPayload::CameraIdle(payload) => {
            assert_eq!(payload.latitude, 40.0);
            assert_eq!(payload.zoom, 8.0);
            assert!(payload.bounds.is_some());
        }
        other => panic!("expected a camera idle payload, got {other:?}"),
    }

    probe.pan_to(CameraPosition::new(LatLng::new(41.0, -73.0), 8.0));
    let events = harness.drain_events().await;
    assert!(!names(&events).contains(&EventName::OnZoomChanged));

    probe.emit(NativeEvent::CameraMoveStarted { reason: 3 });
    let events = harness.drain_events().await;
    match &events[0].payload {
        EventPayload::CameraMoveStarted(payload) => assert!(!payload.is_gesture),
        other => panic!("expected a move-started payload, got {other:?}"),
    }
}

#[tokio::test]
async fn test_marker_drag_updates_stored_position() {
    let mut harness = Harness::new();
    let (map, probe) = harness.map("drag").await;
    let id = map.add_marker(marker(1.0, 1.0)).await.unwrap();
    harness.drain_events().await;

    let moved = LatLng::new(2.5, 3.5);
    probe.emit(NativeEvent::MarkerDragStart {
        id: id.clone(),
        position: LatLng::new(1.0, 1.0),
    });
    probe.emit(NativeEvent::MarkerDragEnd {
        id: id.clone(),
        position: moved,
    });

    let events = harness.drain_events().await;
    assert_eq!(
        names(&events),
        vec![EventName::OnMarkerDragStart, EventName::OnMarkerDragEnd]
    );
    match &events[1].payload {
        EventPayload::Marker(payload) => {
            assert_eq!(payload.marker_id, id);
            assert_eq!((payload.latitude, payload.longitude), (2.5, 3.5));
        }
        other => panic!("expected a marker payload, got {other:?}"),
    }
    assert_eq!(map.marker(&id).await.unwrap().unwrap().coordinate, moved);
}

#[tokio::test]
async fn test_bounds_queries() {
    let harness = Harness::new();
    let (map, probe) = harness.map("bounds").await;

    let screen = map.get_map_bounds().await.unwrap();
    assert_eq!((screen.width(), screen.height()), (400, 300));
    assert!(map.get_lat_lng_bounds().await.unwrap().contains(&LatLng::new(51.5, -0.12)));

    map.update_render(FrameRect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    })
    .await
    .unwrap();
    assert_eq!(probe.frame().width(), 0);
    assert_eq!(
        map.get_lat_lng_bounds().await.unwrap_err().code(),
        "BOUNDS_NOT_FOUND"
    );

    let target = LatLngBounds::new(LatLng::new(10.0, 10.0), LatLng::new(20.0, 20.0));
    map.update_render(FrameRect {
        x: 0.0,
        y: 0.0,
        width: 400.0,
        height: 300.0,
    })
    .await
    .unwrap();
    map.fit_bounds(target, 10).await.unwrap();
    assert_eq!(probe.camera().target, target.center());
}

#[tokio::test]
async fn test_map_settings() {
    let harness = Harness::new();
    let (map, probe) = harness.map("settings").await;

    map.set_map_type("SATELLITE").await.unwrap();
    assert_eq!(map.get_map_type().await.unwrap(), MapType::Satellite);
    map.set_map_type("moon").await.unwrap();
    assert_eq!(probe.map_type(), MapType::Normal);

    map.enable_indoor_maps(true).await.unwrap();
    map.enable_traffic_layer(true).await.unwrap();
    map.enable_current_location(true).await.unwrap();
    assert!(probe.indoor_enabled() && probe.traffic_enabled() && probe.my_location_enabled());

    let padding = Padding {
        top: 10,
        left: 20,
        bottom: 30,
        right: 40,
    };
    map.set_padding(padding).await.unwrap();
    assert_eq!(probe.padding(), padding);
}

#[tokio::test]
async fn test_snapshot_encodes_requested_format() {
    let harness = Harness::new();
    let (map, _probe) = harness.map("snapshot").await;

    let png = map.take_snapshot(SnapshotFormat::Png, 100).await.unwrap();
    let jpeg = map.take_snapshot(SnapshotFormat::Jpeg, 50).await.unwrap();
    assert!(png.starts_with("iVBORw0KGgo"));
    assert!(jpeg.starts_with("/9j/"));
}

#[tokio::test]
async fn test_snapshot_callback_failure_is_reported() {
    let harness = Harness::with_snapshot(SnapshotBehaviour::Fail);
    let (map, _probe) = harness.map("snapshot-fail").await;

    let err = map.take_snapshot(SnapshotFormat::Png, 100).await.unwrap_err();
    assert_eq!(err.code(), "SNAPSHOT_FAILED");
    assert!(err.to_string().contains("no bitmap"));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_that_never_returns_times_out() {
    let harness = Harness::with_snapshot(SnapshotBehaviour::Never);
    let (map, _probe) = harness.map("snapshot-never").await;

    let err = map.take_snapshot(SnapshotFormat::Png, 100).await.unwrap_err();
    assert_eq!(err.code(), "SNAPSHOT_FAILED");
    assert!(err.to_string().contains("5s"));

    // The session keeps serving commands
    assert_eq!(map.get_zoom_level().await.unwrap(), 5.0);
}
