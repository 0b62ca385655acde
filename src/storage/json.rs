use crate::storage::files::write_atomic_sync;
use crate::storage::traits::{StateStorage, StorageResult};
use crate::storage::StateMap;
use std::path::{Path, PathBuf};

/// File name of the state document inside the state directory
pub const STATE_FILE_NAME: &str = "state.json";

/// Incremental state kept as one pretty-printed JSON document
#[derive(Debug, Clone)]
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    /// State file inside `state_dir`
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(STATE_FILE_NAME),
        }
    }
}

impl StateStorage for JsonStateFile {
    fn load(&self) -> StorageResult<StateMap> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateMap::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(StateMap::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, entries: &StateMap) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        write_atomic_sync(&self.path, &json)?;
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
