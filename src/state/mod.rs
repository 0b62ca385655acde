//! State module for tracking mirror progress
//!
//! This module provides the shared, lock-guarded state of a mirror run.
//!
//! # Components
//!
//! - `PageState`: Tracks a page through fetch, parse, asset resolution, rewrite and persist
//! - `Frontier`: Breadth-first page queue plus the visited set
//! - `AssetRegistry`: Exactly-once download slots keyed by canonical asset URL
//! - `IncrementalStore`: ETag/Last-Modified state that survives between runs

mod frontier;
mod incremental;
mod page_state;
mod registry;

// Re-export main types
pub use frontier::Frontier;
pub use incremental::{ConditionalHeaders, IncrementalStore, ResponseValidators};
pub use page_state::PageState;
pub use registry::{AssetRegistry, AssetSlot, StoredAsset};
