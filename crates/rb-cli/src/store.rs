//! Settings store backed by a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use rb_core::store::{ConfigStore, StoreError};
use serde_json::{Map, Value};

pub struct FileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl FileStore {
    /// Open `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::Unavailable(format!(
                        "'{}' does not hold a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(StoreError::Unavailable(format!("Failed to read '{}': {}", path.display(), e))),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove every key.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.values.clear();
        self.flush()
    }

    fn flush(&self) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, text)
            .map_err(|e| StoreError::Unavailable(format!("Failed to write '{}': {}", self.path.display(), e)))
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}
