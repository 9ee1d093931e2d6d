//! Connection to the external SQL engine
//!
//! `SqlSession` owns a single connection reused across queries. When the
//! connection is missing or found closed it reconnects once; if that fails
//! the query fails. There is no retry loop and no timeout bookkeeping.

use tracing::{debug, info, warn};

use crate::data::result_set::ResultSet;
use crate::error::{EngineError, Result};
use crate::sql::generator::{FrequencyOrder, SqlQueryGenerator};

/// An open connection able to run SQL text and return rows as strings
pub trait SqlConnection {
    fn is_closed(&self) -> bool;

    fn query(&mut self, sql: &str) -> Result<ResultSet>;

    fn close(&mut self);
}

/// Opens new connections to the engine
pub trait ConnectionFactory {
    fn connect(&self) -> Result<Box<dyn SqlConnection>>;
}

pub struct SqlSession<F: ConnectionFactory> {
    factory: F,
    connection: Option<Box<dyn SqlConnection>>,
}

impl<F: ConnectionFactory> SqlSession<F> {
    /// Lazily connects on first use
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| !c.is_closed())
    }

    /// Drop the current connection; the next query reconnects
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }

    pub fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        let connection = self.ensure_connection()?;
        info!(target: "sql", "Executing: {}", sql);
        connection.query(sql)
    }

    /// Run an aggregate and return its single value
    pub fn numeric_field_function(
        &mut self,
        generator: &SqlQueryGenerator,
        field: &str,
        function: &str,
    ) -> Result<Option<String>> {
        let sql = generator.numeric_field_function(field, function)?;
        let result = self.execute(&sql)?;
        Ok(result
            .rows()
            .first()
            .and_then(|row| row.get(0))
            .filter(|v| !v.is_empty())
            .map(str::to_string))
    }

    /// Every value tied at the most (or least) frequent count, in two steps
    pub fn frequent_value_in_field(
        &mut self,
        generator: &SqlQueryGenerator,
        field: &str,
        order: FrequencyOrder,
    ) -> Result<ResultSet> {
        let first = self.execute(&generator.frequent_value_in_field(field, order)?)?;

        let frequency = match first.rows().first() {
            Some(row) => {
                let raw = row.get(1).unwrap_or_default();
                raw.parse::<u64>().map_err(|_| {
                    EngineError::SqlExecution(format!("unexpected frequency '{}'", raw))
                })?
            }
            None => return Ok(ResultSet::empty(first.header().to_vec())),
        };

        debug!(target: "sql", "Extreme frequency for '{}' is {}", field, frequency);
        self.execute(&generator.values_with_frequency(field, frequency)?)
    }

    fn ensure_connection(&mut self) -> Result<&mut Box<dyn SqlConnection>> {
        let needs_connect = match &self.connection {
            None => true,
            Some(connection) => {
                if connection.is_closed() {
                    warn!(target: "sql", "Connection closed, reconnecting once");
                    true
                } else {
                    false
                }
            }
        };

        if needs_connect {
            let connection = self.factory.connect().map_err(|e| {
                EngineError::SqlExecution(format!("could not connect to SQL engine: {}", e))
            })?;
            if connection.is_closed() {
                return Err(EngineError::SqlExecution(
                    "SQL engine returned a closed connection".to_string(),
                ));
            }
            self.connection = Some(connection);
        }

        self.connection
            .as_mut()
            .ok_or_else(|| EngineError::SqlExecution("no SQL connection".to_string()))
    }
}
