//! Persisted configuration store
//!
//! A key-value store read with declared defaults: every [`Settings`] key that
//! is missing from the store reads as its default value.

use std::collections::BTreeMap;

use log::error;
use serde_json::{Map, Value};

use crate::config::Settings;

/// Error type for store access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid stored settings: {0}")]
    InvalidValue(#[from] serde_json::Error),
}

/// Key-value storage backing the settings.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
}

fn default_entries() -> Map<String, Value> {
    match serde_json::to_value(Settings::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Read all settings, filling missing keys from the defaults.
pub fn load_settings<S: ConfigStore + ?Sized>(store: &S) -> Result<Settings, StoreError> {
    let mut entries = default_entries();
    for (key, value) in entries.iter_mut() {
        if let Some(stored) = store.get(key)? {
            *value = stored;
        }
    }
    Ok(serde_json::from_value(Value::Object(entries))?)
}

/// Write every settings key.
pub fn save_settings<S: ConfigStore + ?Sized>(store: &mut S, settings: &Settings) -> Result<(), StoreError> {
    let Value::Object(entries) = serde_json::to_value(settings)? else {
        return Err(StoreError::Unavailable("settings did not serialize to an object".to_string()));
    };
    for (key, value) in entries {
        store.set(&key, value)?;
    }
    Ok(())
}

/// Like [`load_settings`], but a failing store yields the defaults.
pub fn load_or_default<S: ConfigStore + ?Sized>(store: &S) -> Settings {
    load_settings(store).unwrap_or_else(|e| {
        error!("Failed to load settings, using defaults: {}", e);
        Settings::default()
    })
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}
