//! Per-field metadata supplied by an external store
//!
//! Readable names and synonyms per language plus the key-field flag. The
//! store is loaded explicitly and handed to the schema inferer, so several
//! datasets can be described side by side.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMetadata {
    /// language -> readable name
    pub readable_names: HashMap<String, String>,
    /// language -> synonyms
    pub synonyms: HashMap<String, BTreeSet<String>>,
    /// Field represents a row compactly
    pub key: bool,
}

impl FieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readable_name(mut self, language: &str, name: impl Into<String>) -> Self {
        self.readable_names.insert(language.to_string(), name.into());
        self
    }

    pub fn with_synonym(mut self, language: &str, synonym: impl Into<String>) -> Self {
        self.synonyms
            .entry(language.to_string())
            .or_default()
            .insert(synonym.into());
        self
    }

    pub fn with_key(mut self, key: bool) -> Self {
        self.key = key;
        self
    }
}

/// originalName -> metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMetadataStore {
    fields: HashMap<String, FieldMetadata>,
}

impl FieldMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed readable names from the column names themselves
    pub fn from_columns(columns: &[String], languages: &[String]) -> Self {
        let mut store = Self::new();
        for column in columns {
            let metadata = languages.iter().fold(FieldMetadata::new(), |m, lang| {
                m.with_readable_name(lang, column.clone())
            });
            store.insert(column.clone(), metadata);
        }
        store
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::SchemaInference(format!("invalid field metadata: {}", e)))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::SchemaInference(e.to_string()))
    }

    pub fn insert(&mut self, original_name: impl Into<String>, metadata: FieldMetadata) {
        self.fields.insert(original_name.into(), metadata);
    }

    pub fn get(&self, original_name: &str) -> Option<&FieldMetadata> {
        self.fields.get(original_name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
