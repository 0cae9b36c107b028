//! Centralized error handling for the map bridge
//!
//! Every session operation reports failure through [`MapError`]. The host side
//! of the bridge only ever sees the stable [`MapError::code`] string and the
//! human readable message, so variants can carry whatever context is useful
//! for logging without leaking internals across the boundary.
//!
//! # Error Categories
//!
//! - **Readiness**: the native map instance is absent (not created yet, timed
//!   out, or already destroyed)
//! - **Lookup**: a single-entity operation referenced an unknown id
//! - **Validation**: a description is missing required geometry or is malformed
//! - **Projection**: bounds were queried before the view was laid out
//! - **Resources**: icon payloads that could not be decoded (non-fatal)
//! - **Native**: failures reported by the native SDK itself
//!
//! # Usage
//!
//! ```rust
//! use map_bridge::errors::{BridgeResult, MapError};
//!
//! fn example(id: &str) -> BridgeResult<()> {
//!     Err(MapError::map_not_ready(id))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using MapError
pub type BridgeResult<T> = Result<T, MapError>;
