use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ReverseConfig {
    pub output: OutputConfig,
    pub dump: DumpConfig,
    pub decode: DecodeLimits,
}

impl ReverseConfig {
    /// Load a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ReverseConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Comment line in the header of generated source files
    pub comment: String,
    /// Width of the `//----` separator lines
    pub rule_width: usize,
    /// Never translate values into source macros
    pub numeric_only: bool,
    /// Keyboard type used when neither the command line nor `dwType` gives one
    pub default_kbd_type: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            comment: "Windows Keyboards Layouts (WKL)".to_string(),
            rule_width: 75,
            numeric_only: false,
            default_kbd_type: 4, // classical 101/102-key keyboard
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DumpConfig {
    /// Page size for the hexa dump. None means the system page size.
    pub page_size: Option<u64>,
}

/// Bounds applied while walking tables from untrusted images.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DecodeLimits {
    pub max_entries: usize,
    pub max_string_chars: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_string_chars: 1024,
        }
    }
}
