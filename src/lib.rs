//! Schema inference and querying over delimited text tables.
//!
//! A CSV file is loaded as a `TabularDataSource`, profiled into a
//! `SchemaType`, and queried either in memory through a `Statement` or by
//! translating filters into SQL with `SqlQueryGenerator` and running it over
//! a `SqlSession`.

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod sql;

pub use config::EngineConfig;
pub use data::datatable::{ColumnRef, Row, TabularDataSource};
pub use data::field_metadata::{FieldMetadata, FieldMetadataStore};
pub use data::filter::{DateOp, Filter, NumericOp, OperatorKind, TextOp};
pub use data::result_set::ResultSet;
pub use data::schema::{SchemaField, SchemaInferer, SchemaType};
pub use data::statement::Statement;
pub use data::type_inference::{ColumnProfile, DataType, TypeInference};
pub use error::{EngineError, Result};
pub use sql::{SqlQueryGenerator, SqlSession, SqliteCsvEngine};
