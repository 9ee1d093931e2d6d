//! SQL translation and execution
//!
//! Query intents become SQL text for an engine that sees the dataset as a
//! table of text columns. `SqlSession` runs that text over a connection from
//! any `ConnectionFactory`; `SqliteCsvEngine` is the embedded one.

pub mod connection;
pub mod escape;
pub mod generator;
pub mod sqlite_engine;

pub use connection::{ConnectionFactory, SqlConnection, SqlSession};
pub use generator::{AggregateFunction, FrequencyOrder, SqlQueryGenerator};
pub use sqlite_engine::{SqliteConnection, SqliteCsvEngine};
