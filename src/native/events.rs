//! Callbacks flowing from the native SDK back into a session

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::NativeId;
use crate::models::LatLng;
use crate::services::clustering::ClusterId;

/// Reason code the SDK reports when a camera move is driven by a user gesture
pub const REASON_GESTURE: i32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    MapLoaded,
    MapClick(LatLng),
    MapLongClick(LatLng),
    MarkerClick(NativeId),
    MarkerDragStart { id: NativeId, position: LatLng },
    MarkerDrag { id: NativeId, position: LatLng },
    MarkerDragEnd { id: NativeId, position: LatLng },
    InfoWindowClick(NativeId),
    PolygonClick(NativeId),
    PolylineClick(NativeId),
    CircleClick(NativeId),
    CameraMoveStarted { reason: i32 },
    CameraMove,
    CameraIdle,
    MyLocationButtonClick,
    MyLocationClick(LatLng),
    ClusterClick(ClusterId),
    ClusterInfoWindowClick(ClusterId),
    /// Clustered items are addressed by marker id, not by a native handle
    ClusterItemClick(String),
    ClusterItemInfoWindowClick(String),
}

/// Host lifecycle hooks forwarded to the native view
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum LifecycleEvent {
    OnStart,
    OnResume,
    OnPause,
    OnStop,
    OnDestroy,
}

/// Where a native map posts its callbacks
#[derive(Debug, Clone)]
pub struct NativeEventSink {
    tx: mpsc::UnboundedSender<NativeEvent>,
}

impl NativeEventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NativeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the session has gone away
    pub fn emit(&self, event: NativeEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(err) => {
                debug!("Dropping native event {:?}: session closed", err.0);
                false
            }
        }
    }
}

/// One-shot "map ready" callback
#[derive(Debug)]
pub struct ReadySignal {
    tx: oneshot::Sender<()>,
}

impl ReadySignal {
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn fire(self) {
        let _ = self.tx.send(());
    }
}
