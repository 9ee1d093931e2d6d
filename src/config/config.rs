use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Settings passed explicitly into the engine at construction
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub import: ImportConfig,
    pub schema: SchemaConfig,
    pub query: QueryConfig,
    pub sql: SqlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Field delimiter of the delimited text source
    pub delimiter: char,

    /// Strip surrounding whitespace from every cell on import
    pub trim_cells: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// TEXT columns with at most this many distinct values are categorical
    pub max_num_different_values: usize,

    /// Languages every field must carry a readable name for
    pub languages: Vec<String>,
}

/// Textual comparisons ignore case unless configured otherwise
pub const DEFAULT_IGNORE_CASE: bool = true;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Case-insensitive textual comparisons, in memory and in SQL
    pub ignore_case: bool,

    /// Rows per page for paged SQL and rendered result sets
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SqlConfig {
    /// Name of the virtual table; derived from the source file when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            trim_cells: false,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_num_different_values: 10,
            languages: vec!["en".to_string()],
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            ignore_case: DEFAULT_IGNORE_CASE,
            page_size: 10,
        }
    }
}

impl ImportConfig {
    /// Delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> std::result::Result<u8, EngineError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "delimiter '{}' is not a single ASCII character",
                    self.delimiter
                ))
            })
    }
}

impl EngineConfig {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("tabular-query").join("config.toml"))
    }

    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        self.import.delimiter_byte()?;

        if self.schema.languages.is_empty() {
            return Err(EngineError::Config(
                "at least one schema language is required".to_string(),
            ));
        }

        if self.query.page_size == 0 {
            return Err(EngineError::Config(
                "page_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
