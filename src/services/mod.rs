pub mod builders;
pub mod clustering;
pub mod debounce;
pub mod icon_cache;
pub mod notifier;
pub mod registry;
pub mod snapshot;

pub use builders::EntityBuilder;
pub use clustering::ClusterCoordinator;
pub use debounce::Debouncer;
pub use icon_cache::{IconBitmap, IconCache};
pub use notifier::{BroadcastNotifier, EventNotifier};
pub use registry::{MarkerHandle, OverlayRegistry};
