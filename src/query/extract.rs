mod expr;
mod set_expr;
mod table;

use compact_str::CompactString;
pub use expr::{extract_columns_from_expr, extract_conditions, extract_nested_queries};
use indexmap::{IndexMap, IndexSet};
pub use set_expr::extract_from_set_expr;
pub use table::extract_from_table_factor;

use super::types::{JoinInfo, WhereCondition};

/// Shape of the outermost SELECT projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionShape {
    /// `SELECT 1` or `SELECT 1 AS one`
    SingleOne,
    /// `SELECT COUNT(...)`
    SingleCount,
    #[default]
    Other
}

/// Collected statement metadata.
///
/// `depth` is non-zero while walking a nested query; WHERE conditions and
/// the projection shape are only recorded at depth zero.
#[derive(Debug, Default)]
pub struct ExtractionContext {
    /// Table name -> first alias seen
    pub tables:         IndexMap<CompactString, Option<CompactString>>,
    pub columns:        IndexSet<CompactString>,
    pub conditions:     Vec<WhereCondition>,
    pub joins:          Vec<JoinInfo>,
    pub aggregations:   IndexSet<CompactString>,
    pub projection:     Option<ProjectionShape>,
    pub subquery_count: u32,
    pub depth:          u32
}

impl ExtractionContext {
    pub fn add_table(&mut self, name: CompactString, alias: Option<CompactString>) {
        self.tables.entry(name).or_insert(alias);
    }

    pub fn is_outermost(&self) -> bool {
        self.depth == 0
    }
}

/// Strip identifier quoting from a rendered object name
pub fn unquote(name: &str) -> CompactString {
    name.chars()
        .filter(|c| !matches!(c, '`' | '"' | '[' | ']'))
        .collect::<String>()
        .into()
}
