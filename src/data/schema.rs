//! Typed schema built once at import
//!
//! `SchemaInferer` scans every column of a `TabularDataSource`, decorates the
//! result with externally supplied readable names and synonyms, and produces
//! a `SchemaType`. Afterwards only explicit user edits change the schema.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::config::SchemaConfig;
use crate::data::datatable::TabularDataSource;
use crate::data::field_metadata::FieldMetadataStore;
use crate::data::type_inference::{DataType, TypeInference};
use crate::error::{EngineError, Result};

/// One column of the schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaField {
    original_name: String,
    readable_names: HashMap<String, String>,
    synonyms: HashMap<String, BTreeSet<String>>,
    data_type: DataType,
    num_different_values: usize,
    categorical: bool,
    main_values: BTreeSet<String>,
    key: bool,
}

impl SchemaField {
    pub fn new(original_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            original_name: original_name.into(),
            readable_names: HashMap::new(),
            synonyms: HashMap::new(),
            data_type: data_type.resolved(),
            num_different_values: 0,
            categorical: false,
            main_values: BTreeSet::new(),
            key: false,
        }
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn num_different_values(&self) -> usize {
        self.num_different_values
    }

    pub fn is_categorical(&self) -> bool {
        self.categorical
    }

    pub fn main_values(&self) -> &BTreeSet<String> {
        &self.main_values
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn set_key(&mut self, key: bool) {
        self.key = key;
    }

    pub fn readable_name(&self, language: &str) -> Option<&str> {
        self.readable_names.get(language).map(String::as_str)
    }

    pub fn set_readable_name(&mut self, language: &str, name: impl Into<String>) {
        self.readable_names.insert(language.to_string(), name.into());
    }

    pub fn synonyms(&self, language: &str) -> impl Iterator<Item = &str> {
        self.synonyms
            .get(language)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Returns false if the synonym was already present
    pub fn add_synonym(&mut self, language: &str, synonym: impl Into<String>) -> bool {
        self.synonyms
            .entry(language.to_string())
            .or_default()
            .insert(synonym.into())
    }

    pub fn remove_synonym(&mut self, language: &str, synonym: &str) -> bool {
        self.synonyms
            .get_mut(language)
            .map(|set| set.remove(synonym))
            .unwrap_or(false)
    }

    /// Readable name or any synonym matches, ignoring case
    pub fn answers_to(&self, language: &str, text: &str) -> bool {
        let text = text.trim();
        self.readable_name(language)
            .is_some_and(|name| name.eq_ignore_ascii_case(text))
            || self.synonyms(language).any(|s| s.eq_ignore_ascii_case(text))
    }
}

/// Named, ordered collection of fields with soft delete
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaType {
    name: String,
    fields: Vec<SchemaField>,
    deleted_fields: Vec<SchemaField>,
}

impl SchemaType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            deleted_fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original names must be unique across live and deleted fields
    pub fn add_field(&mut self, field: SchemaField) -> Result<()> {
        if self.contains_anywhere(field.original_name()) {
            return Err(EngineError::SchemaInference(format!(
                "duplicate field '{}' in schema '{}'",
                field.original_name(),
                self.name
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, original_name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.original_name == original_name)
    }

    pub fn field_mut(&mut self, original_name: &str) -> Option<&mut SchemaField> {
        self.fields
            .iter_mut()
            .find(|f| f.original_name == original_name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.original_name.clone()).collect()
    }

    pub fn key_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.key)
            .map(|f| f.original_name.clone())
            .collect()
    }

    /// Resolve user wording to a live field by readable name or synonym
    pub fn find_by_readable_name(&self, language: &str, text: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.answers_to(language, text))
    }

    pub fn data_type_of(&self, original_name: &str) -> Option<DataType> {
        self.field(original_name).map(SchemaField::data_type)
    }

    pub fn deleted_fields(&self) -> &[SchemaField] {
        &self.deleted_fields
    }

    /// Move a live field to the deleted list
    pub fn delete_field(&mut self, original_name: &str) -> Result<()> {
        let index = self
            .fields
            .iter()
            .position(|f| f.original_name == original_name)
            .ok_or_else(|| EngineError::UnknownField(original_name.to_string()))?;
        let field = self.fields.remove(index);
        self.deleted_fields.push(field);
        debug!(target: "schema", "Deleted field '{}'", original_name);
        Ok(())
    }

    /// Bring a deleted field back, appended after the live fields
    pub fn recover_field(&mut self, original_name: &str) -> Result<()> {
        let index = self
            .deleted_fields
            .iter()
            .position(|f| f.original_name == original_name)
            .ok_or_else(|| EngineError::UnknownField(original_name.to_string()))?;
        let field = self.deleted_fields.remove(index);
        self.fields.push(field);
        debug!(target: "schema", "Recovered field '{}'", original_name);
        Ok(())
    }

    fn contains_anywhere(&self, original_name: &str) -> bool {
        self.fields
            .iter()
            .chain(self.deleted_fields.iter())
            .any(|f| f.original_name == original_name)
    }
}

/// Builds a `SchemaType` from imported data and field metadata
#[derive(Debug, Clone)]
pub struct SchemaInferer {
    max_num_different_values: usize,
    languages: Vec<String>,
}

impl SchemaInferer {
    pub fn new(max_num_different_values: usize, languages: Vec<String>) -> Self {
        Self {
            max_num_different_values,
            languages,
        }
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        Self::new(config.max_num_different_values, config.languages.clone())
    }

    /// Infer every column. Each column needs a metadata entry with a readable
    /// name for every configured language.
    pub fn infer(
        &self,
        source: &TabularDataSource,
        metadata: &FieldMetadataStore,
    ) -> Result<SchemaType> {
        let mut schema = SchemaType::new(source.name());

        for (index, column) in source.column_names().iter().enumerate() {
            let field_metadata = metadata.get(column).ok_or_else(|| {
                EngineError::SchemaInference(format!("no metadata for field '{}'", column))
            })?;

            for language in &self.languages {
                match field_metadata.readable_names.get(language) {
                    Some(name) if !name.trim().is_empty() => {}
                    _ => {
                        return Err(EngineError::SchemaInference(format!(
                            "field '{}' has no readable name for language '{}'",
                            column, language
                        )));
                    }
                }
            }

            let profile = TypeInference::profile_column(
                source.column_values(index),
                self.max_num_different_values,
            );
            debug!(
                target: "schema",
                "Column '{}': {:?}, {} distinct values",
                column,
                profile.data_type,
                profile.num_different_values
            );

            let mut field = SchemaField::new(column.clone(), profile.data_type);
            field.num_different_values = profile.num_different_values;
            field.categorical = profile.main_values.is_some();
            field.main_values = profile.main_values.unwrap_or_default();
            field.readable_names = field_metadata.readable_names.clone();
            field.synonyms = field_metadata.synonyms.clone();
            field.key = field_metadata.key;

            schema.add_field(field)?;
        }

        info!(
            target: "schema",
            "Inferred schema '{}' with {} fields",
            schema.name(),
            schema.fields().len()
        );
        Ok(schema)
    }
}
