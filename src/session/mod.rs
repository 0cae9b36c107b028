//! Map sessions: one actor per native map
//!
//! A session owns the native map handle, the per-kind overlay registries and
//! the optional clustering coordinator. All of that state is touched only from
//! the session's actor task; callers hold a [`MapSessionHandle`] and
//! [`MapManager`] keeps track of every live session by map id.

use serde::Serialize;
use strum::Display;

pub mod actor;
pub mod dispatch;
pub mod events;
pub mod handle;
pub mod manager;
pub mod overlays;

pub use actor::{MapSession, SessionDeps, spawn_session};
pub use dispatch::dispatch;
pub use handle::MapSessionHandle;
pub use manager::MapManager;

/// Lifecycle of a session, published on a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Native map not yet requested
    Uninitialized,
    /// Waiting for the SDK's ready signal
    Initializing,
    Ready,
    /// Terminal; every registry has been cleared
    Destroyed,
}
