//! Data layer: loaded tables, inferred schemas and in-memory queries

// Storage
pub mod datatable;
pub mod result_set;

// Inference
pub mod date_parsing;
pub mod field_metadata;
pub mod schema;
pub mod type_inference;

// Query execution
pub mod filter;
pub mod statement;
