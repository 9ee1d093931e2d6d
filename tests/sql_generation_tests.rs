use std::sync::Arc;
use tabular_query::config::{EngineConfig, ImportConfig, QueryConfig};
use tabular_query::sql::FrequencyOrder;
use tabular_query::{
    DataType, EngineError, FieldMetadataStore, ResultSet, Row, SchemaInferer, SqlQueryGenerator,
    SqlSession, SqliteCsvEngine, Statement, TabularDataSource,
};

const EMPLOYEES: &str = "\
name,dept,salary,hired
Alice,Sales,30000,2020-01-15T09:00:00+00:00
Bob,Marketing,45000,2019-06-01T09:00:00+00:00
Carol,Sales,52000,2021-03-10T09:00:00+00:00
Dan,Marketing,,2018-11-20T09:00:00+00:00
Eve,Support,38000,2022-02-01T09:00:00+00:00
Fay,Support,41000,2017-05-05T09:00:00+00:00
";

fn source() -> Arc<TabularDataSource> {
    Arc::new(
        TabularDataSource::from_reader("employees", EMPLOYEES.as_bytes(), &ImportConfig::default())
            .unwrap(),
    )
}

fn typed_generator(source: &TabularDataSource) -> SqlQueryGenerator {
    let languages = vec!["en".to_string()];
    let metadata = FieldMetadataStore::from_columns(source.column_names(), &languages);
    let schema = SchemaInferer::new(10, languages)
        .infer(source, &metadata)
        .unwrap();
    SqlQueryGenerator::from_schema("employees", &schema)
}

#[test]
fn test_numeric_field_function_text() {
    let mut generator = SqlQueryGenerator::new("employees", vec!["salary".to_string()])
        .with_field_type("salary", DataType::Number);
    assert_eq!(
        generator.numeric_field_function("salary", "avg").unwrap(),
        "SELECT avg(CAST(salary as DECIMAL(38,4))) as avg_salary FROM employees WHERE salary <> ''"
    );

    generator.add_filter("salary", ">", "1000").unwrap();
    let sql = generator.numeric_field_function("salary", "avg").unwrap();
    assert!(sql.starts_with(
        "SELECT avg(CAST(salary as DECIMAL(38,4))) as avg_salary FROM employees WHERE salary <> '' AND "
    ));
    assert!(sql.contains("CAST('1000' as DECIMAL(38,4))"));
}

#[test]
fn test_frequency_returns_every_tie() {
    let source = source();
    let generator = typed_generator(&source);
    let mut session = SqlSession::new(SqliteCsvEngine::new(source));

    let most = session
        .frequent_value_in_field(&generator, "dept", FrequencyOrder::MostFrequent)
        .unwrap();
    assert_eq!(
        most.column_values("dept"),
        vec!["Marketing", "Sales", "Support"]
    );
    assert_eq!(most.column_values("freq"), vec!["2", "2", "2"]);
}

#[test]
fn test_frequency_respects_filters() {
    let source = source();
    let mut generator = typed_generator(&source);
    generator
        .add_filter("hired", "after", "2019-01-01T00:00:00+00:00")
        .unwrap();
    let mut session = SqlSession::new(SqliteCsvEngine::new(source));

    let least = session
        .frequent_value_in_field(&generator, "dept", FrequencyOrder::LeastFrequent)
        .unwrap();
    assert_eq!(least.column_values("dept"), vec!["Marketing", "Support"]);
}

#[test]
fn test_sql_and_statement_agree() {
    let source = source();
    let mut generator = typed_generator(&source);
    generator.add_filter("salary", ">=", "40000").unwrap();
    generator.add_filter("dept", "different", "sales").unwrap();

    let mut session = SqlSession::new(SqliteCsvEngine::new(source.clone()));
    let via_sql = session.execute(&generator.select_all().unwrap()).unwrap();

    let mut statement = Statement::new(source).with_ignore_case(true);
    statement.add_filter("salary", ">=", "40000").unwrap();
    statement.add_filter("dept", "different", "sales").unwrap();
    let in_memory = statement.execute().unwrap();

    assert_eq!(via_sql.column_values("name"), vec!["Bob", "Fay"]);
    assert_eq!(via_sql.column_values("name"), in_memory.column_values("name"));
}

#[test]
fn test_paging_and_counting() {
    let source = source();
    let generator = typed_generator(&source);
    let mut session = SqlSession::new(SqliteCsvEngine::new(source));

    let count = session.execute(&generator.count_rows().unwrap()).unwrap();
    assert_eq!(count.value(0, "num_rows"), Some("6"));

    let page = session
        .execute(&generator.select_all_paged(4, 4).unwrap())
        .unwrap();
    assert_eq!(page.column_values("name"), vec!["Eve", "Fay"]);
}

#[test]
fn test_type_mismatch_has_no_translation() {
    let source = source();
    let mut generator = typed_generator(&source);
    generator.add_filter("name", ">", "5").unwrap();
    assert!(matches!(
        generator.select_all(),
        Err(EngineError::SqlGeneration(_))
    ));
    assert!(matches!(
        generator.numeric_field_function("name", "max"),
        Err(EngineError::SqlGeneration(_))
    ));
}

#[test]
fn test_engine_from_csv_file_and_config() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("employees.csv");
    std::fs::write(&csv_path, EMPLOYEES.replace(',', ";")).unwrap();

    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "[import]\ndelimiter = \";\"\n\n[sql]\ntable_name = \"staff\"\n",
    )
    .unwrap();
    let config = EngineConfig::load_from(&config_path).unwrap();

    let engine = SqliteCsvEngine::from_path(&csv_path, &config.import)
        .unwrap()
        .with_config(&config.sql);
    assert_eq!(engine.table_name(), "staff");

    let generator = SqlQueryGenerator::new("staff", engine.source().column_names().to_vec());
    let mut session = SqlSession::new(engine);
    let max = session
        .numeric_field_function(&generator, "salary", "max")
        .unwrap();
    assert_eq!(max.as_deref(), Some("52000"));
}

fn single_column(name: &str, cells: &[&str]) -> Arc<TabularDataSource> {
    let rows = cells.iter().map(|c| Row::from_iter([*c])).collect();
    Arc::new(TabularDataSource::new("cells", vec![name.to_string()], rows).unwrap())
}

/// Run one filter through SQLite and through `Statement`
fn both_backends(
    source: &Arc<TabularDataSource>,
    config: &QueryConfig,
    filter: (&str, &str, &str),
) -> (ResultSet, ResultSet) {
    let (field, operator, value) = filter;

    let mut generator = SqlQueryGenerator::new("cells", source.column_names().to_vec())
        .with_config(config);
    generator.add_filter(field, operator, value).unwrap();
    let mut session = SqlSession::new(SqliteCsvEngine::new(source.clone()));
    let via_sql = session.execute(&generator.select_all().unwrap()).unwrap();

    let mut statement = Statement::new(source.clone()).with_config(config);
    statement.add_filter(field, operator, value).unwrap();
    (via_sql, statement.execute().unwrap())
}

#[test]
fn test_like_wildcards_match_literally_in_both_backends() {
    let source = single_column("code", &["AxB", "A_B", "100%", "1000", "a_b"]);
    let config = QueryConfig::default();

    let (sql, mem) = both_backends(&source, &config, ("code", "contains", "A_B"));
    assert_eq!(sql.column_values("code"), vec!["A_B", "a_b"]);
    assert_eq!(sql.column_values("code"), mem.column_values("code"));

    let (sql, mem) = both_backends(&source, &config, ("code", "starts with", "100%"));
    assert_eq!(sql.column_values("code"), vec!["100%"]);
    assert_eq!(sql.column_values("code"), mem.column_values("code"));

    let (sql, mem) = both_backends(&source, &config, ("code", "ends with", "%"));
    assert_eq!(sql.column_values("code"), vec!["100%"]);
    assert_eq!(sql.column_values("code"), mem.column_values("code"));
}

#[test]
fn test_non_numeric_cells_never_match_numeric_filters() {
    let source = single_column("amount", &["n/a", "50", "7", "", "8"]);
    let config = QueryConfig::default();

    let (sql, mem) = both_backends(&source, &config, ("amount", "<", "1"));
    assert!(sql.is_empty());
    assert!(mem.is_empty());

    let (sql, mem) = both_backends(&source, &config, ("amount", "<", "10"));
    assert_eq!(sql.column_values("amount"), vec!["7", "8"]);
    assert_eq!(sql.column_values("amount"), mem.column_values("amount"));
}

#[test]
fn test_aggregates_skip_non_numeric_cells() {
    let source = single_column("amount", &["n/a", "50", "7", "8"]);
    let generator = SqlQueryGenerator::new("cells", source.column_names().to_vec());
    let mut session = SqlSession::new(SqliteCsvEngine::new(source));

    let min = session
        .numeric_field_function(&generator, "amount", "min")
        .unwrap();
    assert_eq!(min.as_deref(), Some("7"));

    let count = session
        .numeric_field_function(&generator, "amount", "count")
        .unwrap();
    assert_eq!(count.as_deref(), Some("3"));

    let row = session
        .execute(&generator.row_of_numeric_field_function("amount", "min").unwrap())
        .unwrap();
    assert_eq!(row.column_values("amount"), vec!["7"]);
}

#[test]
fn test_case_rule_from_config_is_shared() {
    let source = single_column("dept", &["Marketing", "Sales"]);

    let (sql, mem) = both_backends(&source, &QueryConfig::default(), ("dept", "equals", "sales"));
    assert_eq!(sql.column_values("dept"), vec!["Sales"]);
    assert_eq!(mem.column_values("dept"), vec!["Sales"]);

    let strict = QueryConfig {
        ignore_case: false,
        ..QueryConfig::default()
    };
    let (sql, mem) = both_backends(&source, &strict, ("dept", "equals", "sales"));
    assert!(sql.is_empty());
    assert!(mem.is_empty());
}

#[test]
fn test_select_page_uses_configured_size() {
    let source = source();
    let config = QueryConfig {
        page_size: 4,
        ..QueryConfig::default()
    };
    let generator = typed_generator(&source).with_config(&config);
    let mut session = SqlSession::new(SqliteCsvEngine::new(source));

    let first = session.execute(&generator.select_page(0).unwrap()).unwrap();
    let second = session.execute(&generator.select_page(1).unwrap()).unwrap();
    assert_eq!(first.row_count(), 4);
    assert_eq!(second.column_values("name"), vec!["Eve", "Fay"]);
}
