// src/state/settings.rs
//
// Registry of every tunable parameter in the instrument.
//
// Stages register their parameters while the graph is being built and keep
// the returned `SharedParam` as their reader handle. The menu layer iterates
// the entries and writes through the registry; nothing here touches the
// audio graph structure.

use std::fmt;

use super::ParamInfo;
use crate::parameter::SharedParam;

/// Error when addressing the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    UnknownSetting(String),
    DuplicateSetting(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::UnknownSetting(key) => write!(f, "Unknown setting '{}'", key),
            SettingsError::DuplicateSetting(key) => {
                write!(f, "Setting '{}' is already registered", key)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// One named parameter.
#[derive(Debug, Clone)]
pub struct SettingEntry {
    pub info: ParamInfo,
    param: SharedParam,
}

impl SettingEntry {
    pub fn value(&self) -> f32 {
        self.param.get()
    }

    pub fn param(&self) -> &SharedParam {
        &self.param
    }

    /// Current value formatted for the menu.
    pub fn display(&self) -> String {
        self.info.format(self.value())
    }
}

/// Ordered registry of named parameters.
///
/// Cloning yields another handle onto the same parameter cells.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    entries: Vec<SettingEntry>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its shared handle.
    pub fn register(&mut self, info: ParamInfo) -> Result<SharedParam, SettingsError> {
        if self.contains(&info.key) {
            return Err(SettingsError::DuplicateSetting(info.key));
        }
        let param = SharedParam::new(&info);
        self.entries.push(SettingEntry {
            info,
            param: param.clone(),
        });
        Ok(param)
    }

    /// Write a value, clamped to the entry range. Returns the stored value.
    pub fn set(&self, key: &str, value: f32) -> Result<f32, SettingsError> {
        let entry = self.entry(key)?;
        entry.param.set(value);
        Ok(entry.param.get())
    }

    /// Apply an encoder delta of `steps` detents.
    pub fn nudge(&self, key: &str, steps: i32) -> Result<f32, SettingsError> {
        let entry = self.entry(key)?;
        let next = entry.param.get() + entry.info.step_size() * steps as f32;
        entry.param.set(next);
        Ok(entry.param.get())
    }

    pub fn get(&self, key: &str) -> Result<f32, SettingsError> {
        Ok(self.entry(key)?.param.get())
    }

    pub fn param(&self, key: &str) -> Result<SharedParam, SettingsError> {
        Ok(self.entry(key)?.param.clone())
    }

    pub fn info(&self, key: &str) -> Result<&ParamInfo, SettingsError> {
        Ok(&self.entry(key)?.info)
    }

    pub fn entries(&self) -> &[SettingEntry] {
        &self.entries
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.info.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore every parameter to its registered default.
    pub fn reset_to_defaults(&self) {
        for entry in &self.entries {
            entry.param.set(entry.info.default);
        }
    }

    fn entry(&self, key: &str) -> Result<&SettingEntry, SettingsError> {
        self.entries
            .iter()
            .find(|e| e.info.key == key)
            .ok_or_else(|| SettingsError::UnknownSetting(key.to_string()))
    }
}
