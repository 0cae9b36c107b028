//! Decoded marker icon cache

pub mod bitmap;
pub mod service;

pub use bitmap::IconBitmap;
pub use service::{IconCache, IconCacheStats};
