//! Arena configuration loaded from JSON

use irk_common::CallConvention;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest integer width the native engine accepts (2^23 - 1)
pub const MAX_INTEGER_WIDTH: u32 = (1 << 23) - 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_integer_width must be between 1 and 8388607, got {0}")]
    WidthOutOfRange(u32),
}

/// Behaviour switches for a [`HandleArena`](crate::HandleArena)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// `emit_module` verifies the module first and refuses invalid ones
    #[serde(default = "default_true")]
    pub verify_before_emit: bool,

    /// Convention given to newly declared functions
    #[serde(default)]
    pub default_call_convention: CallConvention,

    #[serde(default = "default_max_integer_width")]
    pub max_integer_width: u32,

    /// Log a warning for blocks the entry block cannot reach
    #[serde(default = "default_true")]
    pub report_unreachable_blocks: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_integer_width() -> u32 {
    MAX_INTEGER_WIDTH
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            verify_before_emit: true,
            default_call_convention: CallConvention::C,
            max_integer_width: MAX_INTEGER_WIDTH,
            report_unreachable_blocks: true,
        }
    }
}

impl ArenaConfig {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: ArenaConfig = serde_json::from_str(content)?;
        config.validate()
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_integer_width == 0 || self.max_integer_width > MAX_INTEGER_WIDTH {
            return Err(ConfigError::WidthOutOfRange(self.max_integer_width));
        }
        Ok(self)
    }
}
