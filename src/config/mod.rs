//! Configuration module
//!
//! Import, schema, query and SQL settings, loaded from TOML and passed
//! explicitly into the engine.

pub mod config;

pub use config::{
    EngineConfig, ImportConfig, QueryConfig, SchemaConfig, SqlConfig, DEFAULT_IGNORE_CASE,
};
