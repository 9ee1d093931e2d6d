use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tracing::debug;

use crate::config::{QueryConfig, DEFAULT_IGNORE_CASE};
use crate::data::datatable::{remove_column_at, TabularDataSource};
use crate::data::date_parsing::{parse_with, ROW_VALUE_PARSERS};
use crate::data::filter::{DateOp, Filter, NumericOp, OperatorKind, TextOp, TypedValue};
use crate::data::result_set::ResultSet;
use crate::data::type_inference::parse_number;
use crate::error::{EngineError, Result};

/// Accumulates filters and projected fields against one data source.
///
/// Filters are ANDed and text comparisons ignore case unless told otherwise.
/// Executing never touches the source: each run works on its own copy of the
/// rows, so many statements can share one source.
#[derive(Debug, Clone)]
pub struct Statement {
    source: Arc<TabularDataSource>,
    filters: Vec<Filter>,
    fields: Vec<String>,
    ignore_case: bool,
}

impl Statement {
    pub fn new(source: Arc<TabularDataSource>) -> Self {
        Self {
            source,
            filters: Vec::new(),
            fields: Vec::new(),
            ignore_case: DEFAULT_IGNORE_CASE,
        }
    }

    /// Take the case rule from the `[query]` config section
    pub fn with_config(self, config: &QueryConfig) -> Self {
        self.with_ignore_case(config.ignore_case)
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn set_ignore_case(&mut self, ignore_case: bool) {
        self.ignore_case = ignore_case;
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn source(&self) -> &TabularDataSource {
        &self.source
    }

    /// Parse and add a raw `(field, operator, value)` triple
    pub fn add_filter(&mut self, field: &str, operator: &str, value: &str) -> Result<()> {
        let filter = Filter::parse(field, operator, value)?;
        self.push_filter(filter);
        Ok(())
    }

    /// Add a filter unless an identical one is already present
    pub fn push_filter(&mut self, filter: Filter) {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
    }

    /// Project a field; an empty projection means every field
    pub fn add_field(&mut self, field: &str) {
        if !self.fields.iter().any(|f| f == field) {
            self.fields.push(field.to_string());
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get_num_filters(&self) -> usize {
        self.filters.len()
    }

    pub fn clear(&mut self) {
        self.filters.clear();
        self.fields.clear();
    }

    pub fn execute(&self) -> Result<ResultSet> {
        let mut header = self.source.header();
        let mut rows = self.source.rows();

        debug!(
            target: "query",
            "Executing statement on '{}' ({} rows, {} filters, {} fields)",
            self.source.name(),
            rows.len(),
            self.filters.len(),
            self.fields.len()
        );

        for filter in &self.filters {
            let index = header
                .iter()
                .position(|h| h == &filter.field)
                .ok_or_else(|| EngineError::UnknownField(filter.field.clone()))?;
            let predicate = Predicate::compile(filter, self.ignore_case)?;

            rows.retain(|row| row.get(index).is_some_and(|cell| predicate.matches(cell)));

            debug!(target: "query", "After {}: {} rows remain", filter, rows.len());
        }

        if !self.fields.is_empty() {
            if let Some(missing) = self.fields.iter().find(|f| !header.contains(f)) {
                return Err(EngineError::UnknownField(missing.clone()));
            }
            // back to front so earlier indices stay valid
            for index in (0..header.len()).rev() {
                if !self.fields.contains(&header[index]) {
                    remove_column_at(&mut header, &mut rows, index);
                }
            }
        }

        ResultSet::new(header, rows)
    }
}

/// A filter with its value already parsed, ready to test cells
enum Predicate {
    Numeric(NumericOp, f64),
    Text(TextOp, String, bool),
    Date(DateOp, DateTime<FixedOffset>),
}

impl Predicate {
    fn compile(filter: &Filter, ignore_case: bool) -> Result<Self> {
        let predicate = match (filter.operator, filter.typed_value()?) {
            (OperatorKind::Numeric(op), TypedValue::Number(n)) => Predicate::Numeric(op, n),
            (OperatorKind::Date(op), TypedValue::Date(d)) => Predicate::Date(op, d),
            (OperatorKind::Text(op), TypedValue::Text(s)) => {
                let s = if ignore_case { s.to_lowercase() } else { s };
                Predicate::Text(op, s, ignore_case)
            }
            (op, value) => {
                return Err(EngineError::FilterEvaluation(format!(
                    "operator {} cannot take {:?}",
                    op, value
                )));
            }
        };
        Ok(predicate)
    }

    /// Empty or unparseable cells never match numeric or date filters
    fn matches(&self, cell: &str) -> bool {
        match self {
            Predicate::Numeric(op, target) => match parse_number(cell) {
                Some(value) => compare_numbers(value, *target, op),
                None => false,
            },
            Predicate::Date(op, target) => match parse_with(ROW_VALUE_PARSERS, cell) {
                Some(value) => match op {
                    DateOp::Before => value < *target,
                    DateOp::After => value > *target,
                },
                None => false,
            },
            Predicate::Text(op, target, ignore_case) => {
                if *ignore_case {
                    compare_text(&cell.to_lowercase(), target, op)
                } else {
                    compare_text(cell, target, op)
                }
            }
        }
    }
}

// exact comparison, including equality
#[allow(clippy::float_cmp)]
fn compare_numbers(a: f64, b: f64, op: &NumericOp) -> bool {
    match op {
        NumericOp::Equal => a == b,
        NumericOp::NotEqual => a != b,
        NumericOp::LessThan => a < b,
        NumericOp::LessThanOrEqual => a <= b,
        NumericOp::GreaterThan => a > b,
        NumericOp::GreaterThanOrEqual => a >= b,
    }
}

fn compare_text(a: &str, b: &str, op: &TextOp) -> bool {
    match op {
        TextOp::Equals => a == b,
        TextOp::Different => a != b,
        TextOp::Contains => a.contains(b),
        TextOp::StartsWith => a.starts_with(b),
        TextOp::EndsWith => a.ends_with(b),
    }
}
