//! Storage module for persisting mirror output and incremental state
//!
//! This module handles everything the mirror writes to disk, including:
//! - Atomic replacement of pages, assets and rewritten stylesheets
//! - The incremental state document and its backend trait
//! - Record types for validator metadata

mod files;
mod json;
mod traits;

pub use files::{write_atomic, write_atomic_sync};
pub use json::{JsonStateFile, STATE_FILE_NAME};
pub use traits::{StateStorage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Persisted validator state keyed by canonical URL
pub type StateMap = BTreeMap<String, IncrementalEntry>;

/// Validator metadata for one mirrored resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalEntry {
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    pub local_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    /// Same-origin page links found when a page was last rewritten
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    /// Assets a page or stylesheet referenced when it was last rewritten
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
}
