//! # Memory Budget Configuration
//!
//! The sizes of the blocks claimed at startup, loaded once from TOML.
//!
//! ```toml
//! allocator_bytes = 25165824  # 24 MiB
//! arena_bytes = 1048576       # 1 MiB
//! ```
//!
//! Missing keys fall back to [`MemoryConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};
use crate::memory::HEADER_SIZE;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Sizes of the fixed memory blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Size of the free-list allocator block in bytes.
    pub allocator_bytes: usize,
    /// Size of the arena block in bytes. Zero disables the arena.
    pub arena_bytes: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            allocator_bytes: 24 * MIB,
            arena_bytes: MIB,
        }
    }
}

impl MemoryConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on a parse error or a failed validation.
    pub fn from_toml_str(text: &str) -> MemoryResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| MemoryError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| MemoryError::InvalidConfig(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Serializes the config back to TOML.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> MemoryResult<String> {
        toml::to_string(self).map_err(|err| MemoryError::InvalidConfig(err.to_string()))
    }

    /// Checks that the allocator block can hold at least one record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the problem.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.allocator_bytes <= HEADER_SIZE {
            return Err(MemoryError::InvalidConfig(format!(
                "allocator_bytes must be greater than {HEADER_SIZE}, got {}",
                self.allocator_bytes
            )));
        }
        Ok(())
    }
}
