use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::config::{QueryConfig, DEFAULT_IGNORE_CASE};
use crate::data::filter::{DateOp, Filter, NumericOp, OperatorKind, TextOp};
use crate::data::schema::SchemaType;
use crate::data::type_inference::DataType;
use crate::error::{EngineError, Result};
use crate::sql::escape::{alias_fragment, like_pattern, quote_identifier, quote_literal};

/// Every numeric cast uses the same precision and scale
pub const DECIMAL_TYPE: &str = "DECIMAL(38,4)";

/// Aggregates accepted by `numeric_field_function`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Avg,
    Sum,
    Max,
    Min,
    Count,
}

impl AggregateFunction {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "avg" | "average" | "mean" => Ok(AggregateFunction::Avg),
            "sum" => Ok(AggregateFunction::Sum),
            "max" | "maximum" => Ok(AggregateFunction::Max),
            "min" | "minimum" => Ok(AggregateFunction::Min),
            "count" => Ok(AggregateFunction::Count),
            _ => Err(EngineError::SqlGeneration(format!(
                "unknown aggregate function '{}'",
                name
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Max => "max",
            AggregateFunction::Min => "min",
            AggregateFunction::Count => "count",
        }
    }

    fn is_extreme(&self) -> bool {
        matches!(self, AggregateFunction::Max | AggregateFunction::Min)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of the frequency ranking to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyOrder {
    MostFrequent,
    LeastFrequent,
}

/// Translates filters and query intents into SQL text for an external engine
/// that exposes the dataset as a table of text columns.
///
/// Values are interpolated as quoted literals (see `sql::escape`), not bound
/// as parameters.
///
/// Date filters go through the engine's `date()`, so they compare calendar
/// days and only see ISO-8601 cells. `Statement` compares full instants and
/// also reads legacy `dd/MM/yyyy hh:mm:ss a` cells, so the two can disagree
/// on same-day boundaries and on legacy values.
///
/// Cells of fields not known to be numeric are checked with a character
/// pattern before any numeric cast, so text such as `n/a` is skipped rather
/// than read as 0.
#[derive(Debug, Clone)]
pub struct SqlQueryGenerator {
    table: String,
    fields: Vec<String>,
    key_fields: Vec<String>,
    field_types: HashMap<String, DataType>,
    filters: Vec<Filter>,
    ignore_case: bool,
    page_size: usize,
}

impl SqlQueryGenerator {
    pub fn new(table: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            table: table.into(),
            fields,
            key_fields: Vec::new(),
            field_types: HashMap::new(),
            filters: Vec::new(),
            ignore_case: DEFAULT_IGNORE_CASE,
            page_size: QueryConfig::default().page_size,
        }
    }

    /// Take fields, key fields and types from an inferred schema
    pub fn from_schema(table: impl Into<String>, schema: &SchemaType) -> Self {
        let mut generator = Self::new(table, schema.field_names());
        generator.key_fields = schema.key_fields();
        generator.field_types = schema
            .fields()
            .iter()
            .map(|f| (f.original_name().to_string(), f.data_type()))
            .collect();
        generator
    }

    pub fn with_key_fields(mut self, key_fields: Vec<String>) -> Self {
        self.key_fields = key_fields;
        self
    }

    /// Declare a field's type, e.g. when no inferred schema is at hand
    pub fn with_field_type(mut self, field: impl Into<String>, data_type: DataType) -> Self {
        self.field_types.insert(field.into(), data_type);
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Apply the `[query]` config section: case rule and page size
    pub fn with_config(mut self, config: &QueryConfig) -> Self {
        self.ignore_case = config.ignore_case;
        self.page_size = config.page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Parse and add a raw triple; unknown operators have no translation
    pub fn add_filter(&mut self, field: &str, operator: &str, value: &str) -> Result<()> {
        let operator = OperatorKind::parse(operator)
            .map_err(|_| EngineError::SqlGeneration(format!("unknown operator '{}'", operator)))?;
        self.push_filter(Filter::new(field, operator, value));
        Ok(())
    }

    pub fn push_filter(&mut self, filter: Filter) {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn get_num_filters(&self) -> usize {
        self.filters.len()
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// `SELECT * FROM t [WHERE ...]`
    pub fn select_all(&self) -> Result<String> {
        let sql = format!("SELECT * FROM {}{}", self.table_sql(), self.where_clause()?);
        Ok(self.trace(sql))
    }

    /// `select_all` restricted to one page of rows
    pub fn select_all_paged(&self, limit: usize, offset: usize) -> Result<String> {
        let sql = format!(
            "SELECT * FROM {}{} LIMIT {} OFFSET {}",
            self.table_sql(),
            self.where_clause()?,
            limit,
            offset
        );
        Ok(self.trace(sql))
    }

    /// One zero-based page of `page_size` rows
    pub fn select_page(&self, page: usize) -> Result<String> {
        self.select_all_paged(self.page_size, page.saturating_mul(self.page_size))
    }

    pub fn select_fields(&self, fields: &[String]) -> Result<String> {
        if fields.is_empty() {
            return self.select_all();
        }
        for field in fields {
            self.check_field(field)?;
        }
        let columns: Vec<String> = fields.iter().map(|f| quote_identifier(f)).collect();
        let sql = format!(
            "SELECT {} FROM {}{}",
            columns.join(", "),
            self.table_sql(),
            self.where_clause()?
        );
        Ok(self.trace(sql))
    }

    /// `SELECT DISTINCT field FROM t [WHERE ...]`
    pub fn show_field_distinct(&self, field: &str) -> Result<String> {
        self.check_field(field)?;
        let sql = format!(
            "SELECT DISTINCT {} FROM {}{}",
            quote_identifier(field),
            self.table_sql(),
            self.where_clause()?
        );
        Ok(self.trace(sql))
    }

    pub fn count_rows(&self) -> Result<String> {
        let sql = format!(
            "SELECT COUNT(*) as num_rows FROM {}{}",
            self.table_sql(),
            self.where_clause()?
        );
        Ok(self.trace(sql))
    }

    /// Aggregate a numeric field over rows where it is not empty
    pub fn numeric_field_function(&self, field: &str, function: &str) -> Result<String> {
        let function = AggregateFunction::parse(function)?;
        self.check_numeric_field(field)?;
        let sql = format!(
            "SELECT {}({}) as {}_{} FROM {} WHERE {}{}",
            function,
            cast_decimal(&quote_identifier(field)),
            function,
            alias_fragment(field),
            self.table_sql(),
            self.numeric_guard(field),
            self.and_filters()?
        );
        Ok(self.trace(sql))
    }

    /// Key fields (or all fields) of the rows holding the max/min value.
    /// The extreme is computed in a subquery so both sides see the same
    /// value.
    pub fn row_of_numeric_field_function(&self, field: &str, function: &str) -> Result<String> {
        let function = AggregateFunction::parse(function)?;
        if !function.is_extreme() {
            return Err(EngineError::SqlGeneration(format!(
                "row lookup needs max or min, not {}",
                function
            )));
        }
        self.check_numeric_field(field)?;

        let column = quote_identifier(field);
        let projection = if self.key_fields.is_empty() {
            "*".to_string()
        } else {
            self.key_fields
                .iter()
                .map(|f| quote_identifier(f))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let and_filters = self.and_filters()?;
        let guard = self.numeric_guard(field);

        let sql = format!(
            "SELECT {} FROM {} WHERE {} AND {} = (SELECT {}({}) FROM {} WHERE {}{}){}",
            projection,
            self.table_sql(),
            guard,
            cast_decimal(&column),
            function,
            cast_decimal(&column),
            self.table_sql(),
            guard,
            and_filters,
            and_filters
        );
        Ok(self.trace(sql))
    }

    /// Step one of the frequency protocol: the single extreme count
    pub fn frequent_value_in_field(&self, field: &str, order: FrequencyOrder) -> Result<String> {
        self.check_field(field)?;
        let direction = match order {
            FrequencyOrder::MostFrequent => "DESC",
            FrequencyOrder::LeastFrequent => "ASC",
        };
        let column = quote_identifier(field);
        let sql = format!(
            "SELECT {}, COUNT(*) as freq FROM {} WHERE {}{} GROUP BY {} ORDER BY freq {} LIMIT 1",
            column,
            self.table_sql(),
            non_empty(field),
            self.and_filters()?,
            column,
            direction
        );
        Ok(self.trace(sql))
    }

    /// Step two: every value seen exactly `frequency` times
    pub fn values_with_frequency(&self, field: &str, frequency: u64) -> Result<String> {
        self.check_field(field)?;
        let column = quote_identifier(field);
        let sql = format!(
            "SELECT {}, COUNT(*) as freq FROM {} WHERE {}{} GROUP BY {} HAVING COUNT(*) = {} ORDER BY {}",
            column,
            self.table_sql(),
            non_empty(field),
            self.and_filters()?,
            column,
            frequency,
            column
        );
        Ok(self.trace(sql))
    }

    /// ` WHERE a AND b`, or nothing without filters
    pub fn where_clause(&self) -> Result<String> {
        let conditions = self.filter_conditions()?;
        if conditions.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", conditions.join(" AND ")))
        }
    }

    pub fn filter_conditions(&self) -> Result<Vec<String>> {
        self.filters.iter().map(|f| self.filter_to_sql(f)).collect()
    }

    /// Translate one filter into a SQL condition
    pub fn filter_to_sql(&self, filter: &Filter) -> Result<String> {
        self.check_field(&filter.field)?;
        if let Some(field_type) = self.field_types.get(&filter.field) {
            if *field_type != filter.operator.domain() {
                return Err(EngineError::SqlGeneration(format!(
                    "operator '{}' does not apply to {:?} field '{}'",
                    filter.operator, field_type, filter.field
                )));
            }
        }
        // reject values the engine would silently coerce
        filter
            .typed_value()
            .map_err(|e| EngineError::SqlGeneration(e.to_string()))?;

        let column = quote_identifier(&filter.field);
        let condition = match filter.operator {
            OperatorKind::Numeric(op) => format!(
                "{} AND {} {} {}",
                self.numeric_guard(&filter.field),
                cast_decimal(&column),
                numeric_sql(op),
                cast_decimal(&quote_literal(filter.value.trim()))
            ),
            OperatorKind::Text(op) => {
                let (sql_op, pattern, escape) = match op {
                    TextOp::Equals => ("=", filter.value.clone(), ""),
                    TextOp::Different => ("<>", filter.value.clone(), ""),
                    TextOp::Contains => {
                        ("LIKE", format!("%{}%", like_pattern(&filter.value)), LIKE_ESCAPE)
                    }
                    TextOp::StartsWith => {
                        ("LIKE", format!("{}%", like_pattern(&filter.value)), LIKE_ESCAPE)
                    }
                    TextOp::EndsWith => {
                        ("LIKE", format!("%{}", like_pattern(&filter.value)), LIKE_ESCAPE)
                    }
                };
                if self.ignore_case {
                    format!(
                        "UPPER({}) {} UPPER({}){}",
                        column,
                        sql_op,
                        quote_literal(&pattern),
                        escape
                    )
                } else {
                    format!("{} {} {}{}", column, sql_op, quote_literal(&pattern), escape)
                }
            }
            OperatorKind::Date(op) => {
                let sql_op = match op {
                    DateOp::Before => "<",
                    DateOp::After => ">",
                };
                format!(
                    "date({}) {} date({})",
                    column,
                    sql_op,
                    quote_literal(filter.value.trim())
                )
            }
        };
        Ok(condition)
    }

    fn and_filters(&self) -> Result<String> {
        Ok(self
            .filter_conditions()?
            .into_iter()
            .map(|c| format!(" AND {}", c))
            .collect())
    }

    fn table_sql(&self) -> String {
        quote_identifier(&self.table)
    }

    fn check_field(&self, field: &str) -> Result<()> {
        if self.fields.is_empty() || self.fields.iter().any(|f| f == field) {
            Ok(())
        } else {
            Err(EngineError::SqlGeneration(format!(
                "unknown field '{}' in table '{}'",
                field, self.table
            )))
        }
    }

    fn check_numeric_field(&self, field: &str) -> Result<()> {
        self.check_field(field)?;
        match self.field_types.get(field) {
            Some(DataType::Number) | None => Ok(()),
            Some(other) => Err(EngineError::SqlGeneration(format!(
                "field '{}' is {:?}, not numeric",
                field, other
            ))),
        }
    }

    /// Rows whose cell can be read as a number. A field typed `Number` by
    /// inference only holds numbers or empty cells; anything else also has to
    /// look like a number, at least one digit and nothing outside `0-9.eE+-`.
    fn numeric_guard(&self, field: &str) -> String {
        if self.field_types.get(field) == Some(&DataType::Number) {
            return non_empty(field);
        }
        let column = quote_identifier(field);
        format!(
            "{} AND trim({}) GLOB '*[0-9]*' AND trim({}) NOT GLOB '*[^0-9.eE+-]*'",
            non_empty(field),
            column,
            column
        )
    }

    fn trace(&self, sql: String) -> String {
        debug!(target: "sql", "Generated: {}", sql);
        sql
    }
}

const LIKE_ESCAPE: &str = " ESCAPE '\\'";

fn cast_decimal(expr: &str) -> String {
    format!("CAST({} as {})", expr, DECIMAL_TYPE)
}

fn non_empty(field: &str) -> String {
    format!("{} <> ''", quote_identifier(field))
}

fn numeric_sql(op: NumericOp) -> &'static str {
    match op {
        NumericOp::Equal => "=",
        NumericOp::NotEqual => "<>",
        NumericOp::LessThan => "<",
        NumericOp::LessThanOrEqual => "<=",
        NumericOp::GreaterThan => ">",
        NumericOp::GreaterThanOrEqual => ">=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::SchemaField;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn generator() -> SqlQueryGenerator {
        SqlQueryGenerator::new("employees", fields(&["name", "dept", "salary", "hired"]))
            .with_field_type("salary", DataType::Number)
    }

    #[test]
    fn test_numeric_field_function() {
        let sql = generator().numeric_field_function("salary", "avg").unwrap();
        assert_eq!(
            sql,
            "SELECT avg(CAST(salary as DECIMAL(38,4))) as avg_salary FROM employees WHERE salary <> ''"
        );
    }

    #[test]
    fn test_numeric_field_function_with_filters() {
        let mut g = generator();
        g.add_filter("dept", "equals", "Sales").unwrap();
        let sql = g.numeric_field_function("salary", "MAX").unwrap();
        assert_eq!(
            sql,
            "SELECT max(CAST(salary as DECIMAL(38,4))) as max_salary FROM employees \
             WHERE salary <> '' AND UPPER(dept) = UPPER('Sales')"
        );
    }

    #[test]
    fn test_select_all_and_distinct() {
        let mut g = generator();
        assert_eq!(g.select_all().unwrap(), "SELECT * FROM employees");

        g.add_filter("salary", ">=", "1000").unwrap();
        g.add_filter("salary", ">=", "1000").unwrap();
        assert_eq!(g.get_num_filters(), 1);
        assert_eq!(
            g.select_all().unwrap(),
            "SELECT * FROM employees WHERE salary <> '' AND \
             CAST(salary as DECIMAL(38,4)) >= CAST('1000' as DECIMAL(38,4))"
        );
        assert_eq!(
            g.show_field_distinct("dept").unwrap(),
            "SELECT DISTINCT dept FROM employees WHERE salary <> '' AND \
             CAST(salary as DECIMAL(38,4)) >= CAST('1000' as DECIMAL(38,4))"
        );
    }

    #[test]
    fn test_paging() {
        assert_eq!(
            generator().select_all_paged(10, 20).unwrap(),
            "SELECT * FROM employees LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_text_operators() {
        let mut g = generator();
        g.add_filter("name", "contains", "an").unwrap();
        g.add_filter("name", "starts with", "A").unwrap();
        g.add_filter("name", "ends with", "a").unwrap();
        g.add_filter("dept", "different", "HR").unwrap();
        assert_eq!(
            g.filter_conditions().unwrap(),
            vec![
                "UPPER(name) LIKE UPPER('%an%') ESCAPE '\\'",
                "UPPER(name) LIKE UPPER('A%') ESCAPE '\\'",
                "UPPER(name) LIKE UPPER('%a') ESCAPE '\\'",
                "UPPER(dept) <> UPPER('HR')",
            ]
        );

        let g = g.with_ignore_case(false);
        assert_eq!(
            g.filter_conditions().unwrap()[0],
            "name LIKE '%an%' ESCAPE '\\'"
        );
    }

    #[test]
    fn test_like_wildcards_in_values_are_literal() {
        let mut g = generator();
        g.add_filter("name", "contains", "A_B").unwrap();
        g.add_filter("name", "starts with", "100%").unwrap();
        assert_eq!(
            g.filter_conditions().unwrap(),
            vec![
                "UPPER(name) LIKE UPPER('%A\\_B%') ESCAPE '\\'",
                "UPPER(name) LIKE UPPER('100\\%%') ESCAPE '\\'",
            ]
        );
    }

    #[test]
    fn test_untyped_numeric_fields_are_guarded() {
        let mut g = SqlQueryGenerator::new("ledger", fields(&["amount"]));
        g.add_filter("amount", "<", "1").unwrap();
        assert_eq!(
            g.where_clause().unwrap(),
            " WHERE amount <> '' AND trim(amount) GLOB '*[0-9]*' \
             AND trim(amount) NOT GLOB '*[^0-9.eE+-]*' \
             AND CAST(amount as DECIMAL(38,4)) < CAST('1' as DECIMAL(38,4))"
        );

        let g = SqlQueryGenerator::new("ledger", fields(&["amount"]));
        assert!(g
            .numeric_field_function("amount", "min")
            .unwrap()
            .contains("WHERE amount <> '' AND trim(amount) GLOB '*[0-9]*'"));
    }

    #[test]
    fn test_paging_from_config() {
        let config = QueryConfig {
            ignore_case: false,
            page_size: 25,
        };
        let g = generator().with_config(&config);
        assert_eq!(g.page_size(), 25);
        assert_eq!(
            g.select_page(2).unwrap(),
            "SELECT * FROM employees LIMIT 25 OFFSET 50"
        );
        assert_eq!(generator().page_size(), 10);
    }

    #[test]
    fn test_date_operators() {
        let mut g = generator();
        g.add_filter("hired", "before", "2021-01-01T00:00:00+00:00")
            .unwrap();
        g.add_filter("hired", "after", "2020-01-01T00:00:00+00:00")
            .unwrap();
        assert_eq!(
            g.where_clause().unwrap(),
            " WHERE date(hired) < date('2021-01-01T00:00:00+00:00') \
             AND date(hired) > date('2020-01-01T00:00:00+00:00')"
        );
    }

    #[test]
    fn test_literals_are_escaped() {
        let mut g = generator();
        g.add_filter("name", "equals", "O'Brien").unwrap();
        assert_eq!(
            g.where_clause().unwrap(),
            " WHERE UPPER(name) = UPPER('O''Brien')"
        );
    }

    #[test]
    fn test_row_of_numeric_field_function() {
        let g = generator().with_key_fields(fields(&["name"]));
        assert_eq!(
            g.row_of_numeric_field_function("salary", "max").unwrap(),
            "SELECT name FROM employees WHERE salary <> '' AND \
             CAST(salary as DECIMAL(38,4)) = (SELECT max(CAST(salary as DECIMAL(38,4))) \
             FROM employees WHERE salary <> '')"
        );

        let sql = generator()
            .row_of_numeric_field_function("salary", "min")
            .unwrap();
        assert!(sql.starts_with("SELECT * FROM employees"));

        assert!(matches!(
            generator().row_of_numeric_field_function("salary", "avg"),
            Err(EngineError::SqlGeneration(_))
        ));
    }

    #[test]
    fn test_frequency_queries() {
        let g = generator();
        assert_eq!(
            g.frequent_value_in_field("dept", FrequencyOrder::MostFrequent)
                .unwrap(),
            "SELECT dept, COUNT(*) as freq FROM employees WHERE dept <> '' \
             GROUP BY dept ORDER BY freq DESC LIMIT 1"
        );
        assert!(g
            .frequent_value_in_field("dept", FrequencyOrder::LeastFrequent)
            .unwrap()
            .contains("ORDER BY freq ASC"));
        assert_eq!(
            g.values_with_frequency("dept", 3).unwrap(),
            "SELECT dept, COUNT(*) as freq FROM employees WHERE dept <> '' \
             GROUP BY dept HAVING COUNT(*) = 3 ORDER BY dept"
        );
    }

    #[test]
    fn test_generation_errors() {
        let mut g = generator();
        assert!(matches!(
            g.add_filter("salary", "around", "3"),
            Err(EngineError::SqlGeneration(_))
        ));
        assert!(g.numeric_field_function("salary", "median").is_err());
        assert!(g.show_field_distinct("bonus").is_err());

        g.add_filter("salary", ">", "lots").unwrap();
        assert!(matches!(
            g.select_all(),
            Err(EngineError::SqlGeneration(_))
        ));
    }

    #[test]
    fn test_schema_types_constrain_operators() {
        let mut schema = SchemaType::new("employees");
        schema
            .add_field(SchemaField::new("dept", DataType::Text))
            .unwrap();
        schema
            .add_field(SchemaField::new("salary", DataType::Number))
            .unwrap();

        let mut g = SqlQueryGenerator::from_schema("employees", &schema);
        assert!(g.numeric_field_function("dept", "sum").is_err());

        g.add_filter("dept", ">", "3").unwrap();
        assert!(matches!(
            g.where_clause(),
            Err(EngineError::SqlGeneration(_))
        ));
    }

    #[test]
    fn test_quoted_identifiers() {
        let g = SqlQueryGenerator::new("staff list", fields(&["base pay"]))
            .with_field_type("base pay", DataType::Number);
        assert_eq!(
            g.numeric_field_function("base pay", "sum").unwrap(),
            "SELECT sum(CAST(\"base pay\" as DECIMAL(38,4))) as sum_base_pay \
             FROM \"staff list\" WHERE \"base pay\" <> ''"
        );
    }
}
