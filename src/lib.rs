pub mod config;
pub mod errors;
pub mod models;
pub mod native;
pub mod observability;
pub mod services;
pub mod session;

pub use errors::{BridgeResult, MapError};
pub use session::{MapManager, MapSessionHandle, SessionState, dispatch};
