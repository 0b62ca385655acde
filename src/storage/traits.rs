//! Storage traits and error types
//!
//! This module defines the trait interface for incremental state backends and
//! associated error types.

use crate::storage::StateMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for incremental state backends
///
/// A backend persists the whole validator map at once. Implementations must
/// replace the stored state atomically: a reader never observes a partially
/// written map.
pub trait StateStorage: Send + Sync {
    /// Loads the stored state
    ///
    /// # Returns
    ///
    /// * `Ok(StateMap)` - The stored entries (empty when nothing was stored yet)
    /// * `Err(StorageError)` - The stored state exists but cannot be read
    fn load(&self) -> StorageResult<StateMap>;

    /// Replaces the stored state with `entries`
    fn save(&self, entries: &StateMap) -> StorageResult<()>;

    /// Where the state lives, for log messages
    fn location(&self) -> &Path;
}
