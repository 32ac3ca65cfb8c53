//! # Arena Configuration
//!
//! Everything that is fixed for an arena's lifetime: slot size, slot count,
//! guard level and free-list representation. Configs are built in code or
//! loaded from TOML once at startup:
//!
//! ```toml
//! slot_size = 64
//! count = 1024
//! guard = "on"            # off | on | paranoid
//! free_list = "intrusive" # intrusive | indexed
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::SlotLayout;

/// How much heap checking an arena performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardLevel {
    /// Bounds and ownership checks only. Every operation is O(1).
    Off,
    /// Sentinels on free slots, double-free scan and cycle check on `free`
    /// and `destroy`. `free` becomes O(n); `reset` stays O(1).
    On,
    /// Like `On`, and `reset` also walks the free list before rewinding.
    Paranoid,
}

impl GuardLevel {
    /// Checks are on in debug builds and off in release builds.
    #[inline]
    #[must_use]
    pub const fn build_default() -> Self {
        if cfg!(debug_assertions) {
            Self::On
        } else {
            Self::Off
        }
    }

    /// Whether sentinels and free-list scans are active.
    #[inline]
    #[must_use]
    pub const fn checks_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl Default for GuardLevel {
    fn default() -> Self {
        Self::build_default()
    }
}

/// Where free slots are recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeListKind {
    /// Links are stored inside the free slots. No per-slot overhead.
    #[default]
    Intrusive,
    /// Free slot indices are kept in a side stack of `count` entries.
    /// Costs one word per slot, but slot bytes never carry links.
    Indexed,
}

/// Errors loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The TOML could not be parsed into an [`ArenaConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The values parse but describe an impossible arena.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a fixed-size slot arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Requested slot size in bytes. Rounded up to the pointer size
    /// (two words when guard checks are enabled).
    pub slot_size: usize,
    /// Number of slots.
    pub count: usize,
    /// Heap-checking level.
    #[serde(default)]
    pub guard: GuardLevel,
    /// Free-list representation.
    #[serde(default)]
    pub free_list: FreeListKind,
}

impl ArenaConfig {
    /// Creates a config with the build's default guard level and an
    /// intrusive free list.
    ///
    /// # Arguments
    ///
    /// * `slot_size` - Bytes per slot before alignment
    /// * `count` - Number of slots
    #[must_use]
    pub fn new(slot_size: usize, count: usize) -> Self {
        Self {
            slot_size,
            count,
            guard: GuardLevel::default(),
            free_list: FreeListKind::default(),
        }
    }

    /// Fast-path config: no heap checking, intrusive free list.
    #[must_use]
    pub const fn unchecked(slot_size: usize, count: usize) -> Self {
        Self {
            slot_size,
            count,
            guard: GuardLevel::Off,
            free_list: FreeListKind::Intrusive,
        }
    }

    /// Sets the guard level.
    #[must_use]
    pub const fn with_guard(mut self, guard: GuardLevel) -> Self {
        self.guard = guard;
        self
    }

    /// Sets the free-list representation.
    #[must_use]
    pub const fn with_free_list(mut self, free_list: FreeListKind) -> Self {
        self.free_list = free_list;
        self
    }

    /// Total bytes an arena with this config occupies (header plus slots).
    ///
    /// This is the minimum length accepted by placement creation.
    /// Returns `None` if the size overflows.
    #[must_use]
    pub fn required_len(&self) -> Option<usize> {
        SlotLayout::for_config(self).ok().map(|layout| layout.total_len)
    }

    /// Checks that the config describes an arena that can exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the arena size overflows `usize`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SlotLayout::for_config(self)
            .map(|_| ())
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for impossible sizes.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`ArenaConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = ArenaConfig::from_toml_str(
            r#"
            slot_size = 64
            count = 1024
            guard = "paranoid"
            free_list = "indexed"
            "#,
        )
        .unwrap();
        assert_eq!(config.slot_size, 64);
        assert_eq!(config.count, 1024);
        assert_eq!(config.guard, GuardLevel::Paranoid);
        assert_eq!(config.free_list, FreeListKind::Indexed);
    }

    #[test]
    fn test_parse_defaults() {
        let config = ArenaConfig::from_toml_str("slot_size = 16\ncount = 8").unwrap();
        assert_eq!(config.guard, GuardLevel::build_default());
        assert_eq!(config.free_list, FreeListKind::Intrusive);
    }

    #[test]
    fn test_parse_rejects_unknown_guard() {
        let result = ArenaConfig::from_toml_str("slot_size = 16\ncount = 8\nguard = \"loud\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_overflowing_size_is_invalid() {
        let config = ArenaConfig::unchecked(usize::MAX / 2, 4);
        assert!(config.required_len().is_none());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ArenaConfig::from_toml_file("/nonexistent/fixpool.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_builder_style_setters() {
        let config = ArenaConfig::unchecked(24, 10)
            .with_guard(GuardLevel::On)
            .with_free_list(FreeListKind::Indexed);
        assert_eq!(config.guard, GuardLevel::On);
        assert_eq!(config.free_list, FreeListKind::Indexed);
    }
}
