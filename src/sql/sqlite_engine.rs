//! Embedded SQL engine over a loaded CSV dataset
//!
//! Every connection materializes the dataset into an in-memory SQLite table
//! whose columns are all TEXT, which is the shape the generated SQL expects.

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ImportConfig, SqlConfig};
use crate::data::datatable::{Row, TabularDataSource};
use crate::data::result_set::ResultSet;
use crate::error::{EngineError, Result};
use crate::sql::connection::{ConnectionFactory, SqlConnection};
use crate::sql::escape::quote_identifier;

pub struct SqliteCsvEngine {
    source: Arc<TabularDataSource>,
    table_name: String,
}

impl SqliteCsvEngine {
    /// The table is named after the dataset
    pub fn new(source: Arc<TabularDataSource>) -> Self {
        let table_name = source.name().to_string();
        Self { source, table_name }
    }

    pub fn from_path<P: AsRef<Path>>(path: P, config: &ImportConfig) -> Result<Self> {
        let source = TabularDataSource::from_path(path, config)?;
        Ok(Self::new(Arc::new(source)))
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Apply the `[sql]` config section
    pub fn with_config(self, config: &SqlConfig) -> Self {
        match &config.table_name {
            Some(name) => self.with_table_name(name.clone()),
            None => self,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn source(&self) -> &TabularDataSource {
        &self.source
    }

    fn load(&self, conn: &mut Connection) -> Result<()> {
        let table = quote_identifier(&self.table_name);
        let columns: Vec<String> = self
            .source
            .column_names()
            .iter()
            .map(|c| format!("{} TEXT", quote_identifier(c)))
            .collect();
        conn.execute(
            &format!("CREATE TABLE {} ({})", table, columns.join(", ")),
            [],
        )?;

        let placeholders = vec!["?"; self.source.column_count()].join(", ");
        let insert = format!("INSERT INTO {} VALUES ({})", table, placeholders);

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for index in 0..self.source.row_count() {
                if let Some(row) = self.source.row(index) {
                    stmt.execute(params_from_iter(row.cells().iter()))?;
                }
            }
        }
        tx.commit()?;

        info!(
            target: "sql",
            "Loaded {} rows into table {}",
            self.source.row_count(),
            table
        );
        Ok(())
    }
}

impl ConnectionFactory for SqliteCsvEngine {
    fn connect(&self) -> Result<Box<dyn SqlConnection>> {
        if self.source.column_count() == 0 {
            return Err(EngineError::SqlExecution(format!(
                "dataset '{}' has no columns",
                self.source.name()
            )));
        }
        let mut conn = Connection::open_in_memory()?;
        self.load(&mut conn)?;
        Ok(Box::new(SqliteConnection { conn: Some(conn) }))
    }
}

pub struct SqliteConnection {
    conn: Option<Connection>,
}

impl SqlConnection for SqliteConnection {
    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| EngineError::SqlExecution("connection is closed".to_string()))?;

        let mut stmt = conn.prepare(sql)?;
        let header: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let column_count = header.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                cells.push(value_to_string(row.get_ref(i)?));
            }
            rows.push(Row::new(cells));
        }

        debug!(target: "sql", "Query returned {} rows", rows.len());
        ResultSet::new(header, rows)
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                debug!(target: "sql", "Error while closing connection: {}", e);
            }
        }
    }
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}
