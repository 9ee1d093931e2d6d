//! Filter vocabulary shared by in-memory execution and SQL generation
//!
//! A filter is `(field, operator, value)`. Operators form a closed set split
//! by domain, so every consumer matches exhaustively and an unrecognized
//! operator literal is rejected when the filter is built.

use chrono::{DateTime, FixedOffset};
use std::fmt;

use crate::data::date_parsing::{parse_with, DateParser};
use crate::data::type_inference::{parse_number, DataType};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextOp {
    Equals,
    Different,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOp {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Numeric(NumericOp),
    Text(TextOp),
    Date(DateOp),
}

impl OperatorKind {
    /// Parse an operator literal as produced by the intent layer
    pub fn parse(literal: &str) -> Result<Self> {
        let normalized = literal.trim().to_lowercase();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        let op = match normalized.as_str() {
            "=" => OperatorKind::Numeric(NumericOp::Equal),
            "!=" => OperatorKind::Numeric(NumericOp::NotEqual),
            "<" => OperatorKind::Numeric(NumericOp::LessThan),
            "<=" => OperatorKind::Numeric(NumericOp::LessThanOrEqual),
            ">" => OperatorKind::Numeric(NumericOp::GreaterThan),
            ">=" => OperatorKind::Numeric(NumericOp::GreaterThanOrEqual),
            "equals" => OperatorKind::Text(TextOp::Equals),
            "different" => OperatorKind::Text(TextOp::Different),
            "contains" => OperatorKind::Text(TextOp::Contains),
            "starts with" => OperatorKind::Text(TextOp::StartsWith),
            "ends with" => OperatorKind::Text(TextOp::EndsWith),
            "before" => OperatorKind::Date(DateOp::Before),
            "after" => OperatorKind::Date(DateOp::After),
            _ => {
                return Err(EngineError::FilterEvaluation(format!(
                    "unknown operator '{}'",
                    literal
                )));
            }
        };
        Ok(op)
    }

    /// Data type a field must have for this operator to apply
    pub fn domain(&self) -> DataType {
        match self {
            OperatorKind::Numeric(_) => DataType::Number,
            OperatorKind::Text(_) => DataType::Text,
            OperatorKind::Date(_) => DataType::Date,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Numeric(NumericOp::Equal) => "=",
            OperatorKind::Numeric(NumericOp::NotEqual) => "!=",
            OperatorKind::Numeric(NumericOp::LessThan) => "<",
            OperatorKind::Numeric(NumericOp::LessThanOrEqual) => "<=",
            OperatorKind::Numeric(NumericOp::GreaterThan) => ">",
            OperatorKind::Numeric(NumericOp::GreaterThanOrEqual) => ">=",
            OperatorKind::Text(TextOp::Equals) => "equals",
            OperatorKind::Text(TextOp::Different) => "different",
            OperatorKind::Text(TextOp::Contains) => "contains",
            OperatorKind::Text(TextOp::StartsWith) => "starts with",
            OperatorKind::Text(TextOp::EndsWith) => "ends with",
            OperatorKind::Date(DateOp::Before) => "before",
            OperatorKind::Date(DateOp::After) => "after",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter value read under its operator's domain
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Number(f64),
    Date(DateTime<FixedOffset>),
    Text(String),
}

/// A single predicate. Equality is by the full triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    pub field: String,
    pub operator: OperatorKind,
    pub value: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: OperatorKind, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Build a filter from the raw triple
    pub fn parse(field: &str, operator: &str, value: &str) -> Result<Self> {
        Ok(Self::new(field, OperatorKind::parse(operator)?, value))
    }

    /// Read the value under the operator's domain. Filter dates must be
    /// ISO-8601 offset date-times.
    pub fn typed_value(&self) -> Result<TypedValue> {
        match self.operator {
            OperatorKind::Numeric(_) => parse_number(&self.value)
                .map(TypedValue::Number)
                .ok_or_else(|| self.bad_value("a number")),
            OperatorKind::Date(_) => parse_with(&[DateParser::IsoOffset], &self.value)
                .map(TypedValue::Date)
                .ok_or_else(|| self.bad_value("an ISO-8601 offset date-time")),
            OperatorKind::Text(_) => Ok(TypedValue::Text(self.value.clone())),
        }
    }

    fn bad_value(&self, expected: &str) -> EngineError {
        EngineError::FilterEvaluation(format!(
            "value '{}' for {} {} is not {}",
            self.value, self.field, self.operator, expected
        ))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.field, self.operator, self.value)
    }
}
