use crate::assets::AssetCategory;
use crate::url::CanonicalUrl;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// An asset that reached disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    /// Local file under the output root
    pub path: PathBuf,
    pub category: AssetCategory,
}

/// Outcome slot for one canonical asset URL
///
/// Empty while the first fetch is in flight, then `Some` for a stored asset
/// or `None` for a failed or rejected one. Failures are kept for the rest of
/// the run.
pub type AssetSlot = Arc<OnceCell<Option<StoredAsset>>>;

/// Run-wide map from canonical asset URL to its local file
///
/// Each URL gets exactly one slot. The first caller to initialize a slot
/// performs the download; concurrent callers wait on the same slot and never
/// see a path before the file behind it is complete.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    slots: Mutex<HashMap<CanonicalUrl, AssetSlot>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `key`, inserting an empty one if absent
    pub fn slot(&self, key: &CanonicalUrl) -> AssetSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Canonical URL to local path for every stored asset
    pub fn snapshot(&self) -> BTreeMap<String, PathBuf> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .filter_map(|(key, slot)| match slot.get() {
                Some(Some(asset)) => Some((key.to_string(), asset.path.clone())),
                _ => None,
            })
            .collect()
    }
}
