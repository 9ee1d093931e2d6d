//! Column type inference
//!
//! A column is classified by scanning every raw cell once. Each cell can only
//! clear flags, so the result does not depend on row order. Resolution is
//! fixed: all-empty columns are TEXT, then DATE wins over NUMBER, and
//! anything else is TEXT.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::date_parsing::is_iso_offset_date_time;

/// Inferred classification of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Number,
    Date,
    Text,
    /// Only seen while scanning; never stored on a field
    Empty,
}

impl DataType {
    /// Collapse the transient EMPTY state into a storable type
    pub fn resolved(self) -> Self {
        match self {
            DataType::Empty => DataType::Text,
            other => other,
        }
    }
}

/// Parse a cell as a finite floating point number
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// What a single scan over one column learned
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub data_type: DataType,
    pub num_different_values: usize,
    /// Distinct raw values, kept only for categorical TEXT columns
    pub main_values: Option<BTreeSet<String>>,
}

impl ColumnProfile {
    pub fn is_categorical(&self) -> bool {
        self.main_values.is_some()
    }
}

/// Type inference utilities
pub struct TypeInference;

impl TypeInference {
    /// Infer the type of a column from all of its raw cells
    pub fn infer_type<'a, I>(values: I) -> DataType
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut flags = InferenceFlags::new();
        for value in values {
            flags.observe(value);
        }
        flags.resolve()
    }

    /// Infer type, cardinality and categorical values of a column.
    ///
    /// `max_num_different_values` is inclusive: a TEXT column with exactly
    /// that many distinct raw values is still categorical.
    pub fn profile_column<'a, I>(values: I, max_num_different_values: usize) -> ColumnProfile
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut flags = InferenceFlags::new();
        let mut distinct = BTreeSet::new();

        for value in values {
            flags.observe(value);
            if !distinct.contains(value) {
                distinct.insert(value.to_string());
            }
        }

        let data_type = flags.resolve();
        let num_different_values = distinct.len();
        let main_values = (data_type == DataType::Text
            && num_different_values <= max_num_different_values)
            .then_some(distinct);

        ColumnProfile {
            data_type,
            num_different_values,
            main_values,
        }
    }
}

struct InferenceFlags {
    is_number: bool,
    is_date: bool,
    is_empty: bool,
}

impl InferenceFlags {
    fn new() -> Self {
        Self {
            is_number: true,
            is_date: true,
            is_empty: true,
        }
    }

    fn observe(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.is_empty = false;

        if self.is_number && parse_number(value).is_none() {
            self.is_number = false;
        }
        if self.is_date && !is_iso_offset_date_time(value) {
            self.is_date = false;
        }
    }

    fn resolve(&self) -> DataType {
        if self.is_empty {
            DataType::Empty.resolved()
        } else if self.is_date {
            DataType::Date
        } else if self.is_number {
            DataType::Number
        } else {
            DataType::Text
        }
    }
}
