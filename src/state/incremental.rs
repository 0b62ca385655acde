use crate::storage::{IncrementalEntry, StateMap, StateStorage, StorageResult};
use crate::url::CanonicalUrl;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Validator headers taken from a 200 response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseValidators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

/// Headers for a conditional GET
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

impl ConditionalHeaders {
    pub fn is_empty(&self) -> bool {
        self.if_none_match.is_none() && self.if_modified_since.is_none()
    }
}

/// Validator metadata shared by pages and assets
///
/// Loaded once when the engine starts and flushed when it stops. When
/// incremental mode is off the store neither supplies conditional headers
/// nor records anything.
pub struct IncrementalStore {
    enabled: bool,
    backend: Option<Box<dyn StateStorage>>,
    entries: Mutex<StateMap>,
}

impl IncrementalStore {
    /// Loads prior state from `backend`
    ///
    /// A corrupt store is logged and treated as empty.
    pub fn load(backend: Box<dyn StateStorage>, enabled: bool) -> Self {
        let entries = if enabled {
            match backend.load() {
                Ok(entries) => {
                    tracing::debug!(
                        "Loaded {} incremental entries from {}",
                        entries.len(),
                        backend.location().display()
                    );
                    entries
                }
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable incremental state at {}: {}",
                        backend.location().display(),
                        e
                    );
                    StateMap::new()
                }
            }
        } else {
            StateMap::new()
        };

        Self {
            enabled,
            backend: Some(backend),
            entries: Mutex::new(entries),
        }
    }

    /// Store with no backend, for runs that keep nothing between invocations
    pub fn in_memory(enabled: bool) -> Self {
        Self {
            enabled,
            backend: None,
            entries: Mutex::new(StateMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Conditional headers from the previous successful fetch of `key`
    pub fn conditional_headers(&self, key: &CanonicalUrl) -> ConditionalHeaders {
        if !self.enabled {
            return ConditionalHeaders::default();
        }

        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key.as_str()) {
            Some(entry) => ConditionalHeaders {
                if_none_match: entry.etag.clone(),
                if_modified_since: entry.last_modified.clone(),
            },
            None => ConditionalHeaders::default(),
        }
    }

    /// Upserts the entry for `key` after a 200 response
    ///
    /// # Arguments
    ///
    /// * `key` - Canonical URL of the page or asset
    /// * `validators` - ETag, Last-Modified and Content-Type of the response
    /// * `local_path` - File the body was written to
    /// * `links` - Same-origin page links (pages only)
    /// * `assets` - Canonical URLs of referenced assets (pages and stylesheets)
    pub fn record_success(
        &self,
        key: &CanonicalUrl,
        validators: &ResponseValidators,
        local_path: &Path,
        links: Vec<String>,
        assets: Vec<String>,
    ) {
        if !self.enabled {
            return;
        }

        let entry = IncrementalEntry {
            etag: validators.etag.clone(),
            last_modified: validators.last_modified.clone(),
            content_type: validators.content_type.clone(),
            local_path: local_path.to_path_buf(),
            timestamp: Utc::now(),
            links,
            assets,
        };

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry);
    }

    /// Resolves a 304 for `key` to the previously stored entry
    ///
    /// Returns `None` when there is no entry or its file is gone; the caller
    /// must then refetch without conditional headers.
    pub fn resolve_not_modified(&self, key: &CanonicalUrl) -> Option<IncrementalEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key.as_str())?;
        if entry.local_path.is_file() {
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Local path recorded for `key`
    pub fn local_path(&self, key: &CanonicalUrl) -> Option<PathBuf> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key.as_str()).map(|e| e.local_path.clone())
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the current state through the backend
    pub fn flush(&self) -> StorageResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        let snapshot = {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.clone()
        };
        backend.save(&snapshot)?;
        tracing::debug!(
            "Saved {} incremental entries to {}",
            snapshot.len(),
            backend.location().display()
        );
        Ok(())
    }
}
