//! Error type definitions for the map bridge

use serde_json::json;
use thiserror::Error;

use crate::models::OverlayKind;

/// Top-level error type for every session operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    /// The native map instance is absent
    #[error("Map not ready: {map_id}")]
    MapNotReady { map_id: String },

    /// A single-entity operation referenced an unknown id
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: OverlayKind, id: String },

    /// Malformed input description
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Projection or bounds queried before layout settled
    #[error("Bounds not found for map {map_id}")]
    BoundsNotFound { map_id: String },

    /// Icon payload present but undecodable
    #[error("Could not decode resource {resource}: {message}")]
    ResourceDecode { resource: String, message: String },

    /// The native snapshot callback failed, returned nothing, or timed out
    #[error("Snapshot failed: {message}")]
    SnapshotFailed { message: String },

    /// Errors reported by the native SDK
    #[error("Native map error: {0}")]
    Native(#[from] NativeError),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failure reported by a [`crate::native::NativeMap`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct NativeError(pub String);

impl NativeError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self(message.into())
    }
}

/// Convenience methods for creating common error types
impl MapError {
    pub fn map_not_ready<S: Into<String>>(map_id: S) -> Self {
        Self::MapNotReady {
            map_id: map_id.into(),
        }
    }

    pub fn entity_not_found<S: Into<String>>(kind: OverlayKind, id: S) -> Self {
        Self::EntityNotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a validation error with a custom message
    pub fn invalid_arguments<S: Into<String>>(message: S) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn bounds_not_found<S: Into<String>>(map_id: S) -> Self {
        Self::BoundsNotFound {
            map_id: map_id.into(),
        }
    }

    pub fn resource_decode<R: Into<String>, M: Into<String>>(resource: R, message: M) -> Self {
        Self::ResourceDecode {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn snapshot_failed<S: Into<String>>(message: S) -> Self {
        Self::SnapshotFailed {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable code reported to the host through the failure channel
    pub fn code(&self) -> &'static str {
        match self {
            MapError::MapNotReady { .. } => "MAP_NOT_READY",
            MapError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            MapError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            MapError::BoundsNotFound { .. } => "BOUNDS_NOT_FOUND",
            MapError::ResourceDecode { .. } => "RESOURCE_DECODE",
            MapError::SnapshotFailed { .. } => "SNAPSHOT_FAILED",
            MapError::Native(_) => "NATIVE_ERROR",
            MapError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// JSON shape handed back to the host on failure
    pub fn to_bridge_error(&self) -> serde_json::Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_arguments(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(MapError::map_not_ready("m").code(), "MAP_NOT_READY");
        assert_eq!(
            MapError::entity_not_found(OverlayKind::Marker, "m1").code(),
            "ENTITY_NOT_FOUND"
        );
        assert_eq!(
            MapError::from(NativeError::new("boom")).code(),
            "NATIVE_ERROR"
        );
    }

    #[test]
    fn test_bridge_error_shape() {
        let err = MapError::entity_not_found(OverlayKind::Circle, "ci3");
        let value = err.to_bridge_error();
        assert_eq!(value["code"], "ENTITY_NOT_FOUND");
        assert_eq!(value["message"], "circle not found: ci3");
    }
}
