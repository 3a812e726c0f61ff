//! Minimal PostgREST query rendering: filters, ordering, paging and exact counts.

use std::fmt::Display;

/// One horizontal filter, rendered as `column=op.value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    column: String,
    expr: String,
}

impl Filter {
    pub fn eq(column: &str, value: impl Display) -> Self {
        Self {
            column: column.to_string(),
            expr: format!("eq.{}", value),
        }
    }

    /// Array overlap (`&&`) against a literal array of strings.
    pub fn overlaps<S: AsRef<str>>(column: &str, values: &[S]) -> Self {
        let items = values
            .iter()
            .map(|v| quote_array_item(v.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            column: column.to_string(),
            expr: format!("ov.{{{}}}", items),
        }
    }

    /// Case-insensitive pattern match; `*` is the wildcard.
    pub fn ilike(column: &str, pattern: &str) -> Self {
        Self {
            column: column.to_string(),
            expr: format!("ilike.{}", pattern),
        }
    }

    pub(crate) fn pair(&self) -> (String, String) {
        (self.column.clone(), self.expr.clone())
    }
}

fn quote_array_item(item: &str) -> String {
    let escaped = item.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// A read against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    columns: String,
    filters: Vec<Filter>,
    order: Vec<(String, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
    count_exact: bool,
}

impl Select {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            count_exact: false,
        }
    }

    /// Column list, embeds allowed. Whitespace is dropped so multi-line lists can be used.
    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.chars().filter(|c| !c.is_whitespace()).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn overlaps<S: AsRef<str>>(self, column: &str, values: &[S]) -> Self {
        self.filter(Filter::overlaps(column, values))
    }

    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.filter(Filter::ilike(column, pattern))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Inclusive row range, zero-based.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count_exact = true;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn wants_count(&self) -> bool {
        self.count_exact
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        pairs.extend(self.filters.iter().map(Filter::pair));
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(col, asc)| format!("{}.{}", col, if *asc { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_string(), order));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

/// Total from a `Content-Range` header such as `0-23/1234` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse().ok()
}
