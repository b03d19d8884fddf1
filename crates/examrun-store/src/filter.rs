//! Backend filter-string construction.
//!
//! Clauses are joined with `&&`. String literals have embedded quote
//! characters doubled (both `'` and `"`) so interpolated values cannot
//! break out of the clause.

/// Double embedded quote characters so a value stays inside its literal.
pub fn escape(value: &str) -> String {
    value.replace('\'', "''").replace('"', "\"\"")
}

/// Builder for equality/range filter expressions.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field = 'value'`
    pub fn eq(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field} = '{}'", escape(value)));
        self
    }

    /// `field >= 'value'`
    pub fn ge(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field} >= '{}'", escape(value)));
        self
    }

    /// `field < 'value'`
    pub fn lt(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field} < '{}'", escape(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn build(self) -> String {
        self.clauses.join(" && ")
    }
}
