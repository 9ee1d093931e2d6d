use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::io::Write;

use crate::data::datatable::{check_row_lengths, Row};
use crate::error::Result;

/// Immutable tabular answer of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    header: Vec<String>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Every row must have exactly one cell per header column
    pub fn new(header: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        check_row_lengths(&header, &rows)?;
        Ok(Self { header, rows })
    }

    /// No rows, but still a valid answer
    pub fn empty(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.header.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(index)
    }

    pub fn column_values(&self, column: &str) -> Vec<&str> {
        match self.header.iter().position(|h| h == column) {
            Some(index) => self.rows.iter().filter_map(|r| r.get(index)).collect(),
            None => Vec::new(),
        }
    }

    /// Number of pages of `page_size` rows; an empty result has one page
    pub fn num_pages(&self, page_size: usize) -> usize {
        if page_size == 0 || self.rows.is_empty() {
            return 1;
        }
        self.rows.len().div_ceil(page_size)
    }

    /// Rows of one zero-based page, with the same header
    pub fn page(&self, page: usize, page_size: usize) -> ResultSet {
        let start = page.saturating_mul(page_size).min(self.rows.len());
        let end = start.saturating_add(page_size).min(self.rows.len());
        ResultSet {
            header: self.header.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let headers: Vec<Cell> = self
            .header
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        table.set_header(headers);

        for row in &self.rows {
            table.add_row(row.cells().to_vec());
        }

        table.to_string()
    }

    /// Render one page followed by a position footer
    pub fn render_page(&self, page: usize, page_size: usize) -> String {
        let total = self.num_pages(page_size);
        format!(
            "{}\nPage {} of {} ({} rows)",
            self.page(page, page_size).render(),
            page.min(total - 1) + 1,
            total,
            self.rows.len()
        )
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.header)?;
        for row in &self.rows {
            wtr.write_record(row.cells())?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn numbers(count: usize) -> ResultSet {
        let rows = (0..count)
            .map(|i| Row::from_iter([format!("n{}", i), i.to_string()]))
            .collect();
        ResultSet::new(vec!["name".into(), "value".into()], rows).unwrap()
    }

    #[test]
    fn test_length_invariant() {
        let err = ResultSet::new(vec!["a".into()], vec![Row::from_iter(["1", "2"])]).unwrap_err();
        assert!(matches!(err, EngineError::DataIntegrity { row: 0, .. }));
    }

    #[test]
    fn test_pagination() {
        let result = numbers(25);
        assert_eq!(result.num_pages(10), 3);

        let last = result.page(2, 10);
        assert_eq!(last.row_count(), 5);
        assert_eq!(last.value(0, "name"), Some("n20"));

        assert!(result.page(9, 10).is_empty());
        assert_eq!(numbers(0).num_pages(10), 1);
    }

    #[test]
    fn test_render_page_footer() {
        let rendered = numbers(12).render_page(1, 10);
        assert!(rendered.contains("n11"));
        assert!(!rendered.contains("n9"));
        assert!(rendered.ends_with("Page 2 of 2 (12 rows)"));
    }

    #[test]
    fn test_render_contains_header() {
        let rendered = numbers(1).render();
        assert!(rendered.contains("name"));
        assert!(rendered.contains("value"));
    }

    #[test]
    fn test_write_csv() {
        let mut buffer = Vec::new();
        numbers(2).write_csv(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "name,value\nn0,0\nn1,1\n"
        );
    }

    #[test]
    fn test_column_values() {
        let result = numbers(3);
        assert_eq!(result.column_values("value"), vec!["0", "1", "2"]);
        assert!(result.column_values("missing").is_empty());
    }
}
