use compact_str::CompactString;
use serde::Serialize;
use smallvec::SmallVec;

use crate::inflect::{singularize, table_to_model};

/// Type alias for small column vectors (typically < 8 elements)
pub type ColumnVec = SmallVec<[CompactString; 8]>;

/// Structured analysis of one SQL statement.
///
/// Produced once by [`analyze`](super::analyze) and never mutated afterwards.
/// Every field is present by construction, so rules and scorers can rely on
/// a single stable shape.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnalysis {
    pub raw_sql:          String,
    pub intent:           QueryIntent,
    pub tables:           Vec<TableReference>,
    pub columns:          Vec<ColumnReference>,
    pub where_conditions: Vec<WhereCondition>,
    pub joins:            Vec<JoinInfo>,
    pub aggregations:     ColumnVec,
    pub order_columns:    ColumnVec,
    /// INSERT column list or UPDATE SET targets
    pub write_columns:    ColumnVec,
    pub has_limit:        bool,
    pub has_order:        bool,
    pub has_offset:       bool,
    pub limit:            Option<u64>,
    pub offset:           Option<u64>,
    pub subquery_count:   u32,
    pub complexity:       Complexity,
    pub rails_patterns:   Vec<String>,
    pub parsed_with:      ParseSource
}

impl QueryAnalysis {
    pub(crate) fn empty(raw_sql: &str, parsed_with: ParseSource) -> Self {
        Self {
            raw_sql:          raw_sql.to_string(),
            intent:           QueryIntent::DataRetrieval,
            tables:           Vec::new(),
            columns:          Vec::new(),
            where_conditions: Vec::new(),
            joins:            Vec::new(),
            aggregations:     ColumnVec::new(),
            order_columns:    ColumnVec::new(),
            write_columns:    ColumnVec::new(),
            has_limit:        false,
            has_order:        false,
            has_offset:       false,
            limit:            None,
            offset:           None,
            subquery_count:   0,
            complexity:       Complexity::Unknown,
            rails_patterns:   Vec::new(),
            parsed_with
        }
    }

    /// First table referenced by the statement
    pub fn primary_table(&self) -> Option<&TableReference> {
        self.tables.first()
    }

    /// Model name of the primary table
    pub fn primary_model(&self) -> Option<&str> {
        self.primary_table().map(|t| t.model.as_str())
    }

    /// WHERE columns that look like foreign keys, in parse order
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ColumnReference> {
        self.where_conditions
            .iter()
            .map(|c| &c.column)
            .filter(|c| c.is_foreign_key)
    }

    pub fn has_foreign_key_condition(&self) -> bool {
        self.foreign_keys().next().is_some()
    }
}

/// What the statement is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum QueryIntent {
    ExistenceCheck,
    CountAggregate,
    DataRetrieval,
    DataInsertion,
    DataUpdate,
    DataDeletion,
    TransactionControl,
    SchemaOperation
}

impl QueryIntent {
    pub fn is_write(self) -> bool {
        matches!(self, Self::DataInsertion | Self::DataUpdate | Self::DataDeletion)
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExistenceCheck => write!(f, "existence_check"),
            Self::CountAggregate => write!(f, "count_aggregate"),
            Self::DataRetrieval => write!(f, "data_retrieval"),
            Self::DataInsertion => write!(f, "data_insertion"),
            Self::DataUpdate => write!(f, "data_update"),
            Self::DataDeletion => write!(f, "data_deletion"),
            Self::TransactionControl => write!(f, "transaction_control"),
            Self::SchemaOperation => write!(f, "schema_operation")
        }
    }
}

/// Coarse structural complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
    /// Statement could not be parsed; regex fallback was used
    Unknown
}

impl Complexity {
    pub const MEDIUM_SCORE: u32 = 2;
    pub const HIGH_SCORE: u32 = 5;

    pub fn from_score(score: u32) -> Self {
        if score >= Self::HIGH_SCORE {
            Self::High
        } else if score >= Self::MEDIUM_SCORE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Unknown => write!(f, "unknown")
        }
    }
}

/// Which parser produced the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseSource {
    Mysql,
    Postgres,
    /// Regex heuristics after every dialect failed
    Fallback
}

/// Table referenced by a statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReference {
    pub name:  CompactString,
    pub alias: Option<CompactString>,
    /// Conventional model class name (`page_views` -> `PageView`)
    pub model: String
}

impl TableReference {
    pub fn new(name: &str, alias: Option<&str>) -> Self {
        Self {
            name:  name.into(),
            alias: alias.map(Into::into),
            model: table_to_model(name)
        }
    }

    /// Singular snake_case name (`page_views` -> `page_view`)
    pub fn singular(&self) -> String {
        let base = self.name.rsplit('.').next().unwrap_or(&self.name);
        singularize(base)
    }
}

/// Column referenced by a statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnReference {
    pub name:           CompactString,
    pub table:          Option<CompactString>,
    pub is_foreign_key: bool,
    /// `company_id` -> `company`
    pub association:    Option<String>
}

impl ColumnReference {
    pub fn new(name: &str, table: Option<&str>) -> Self {
        let lower = name.to_lowercase();
        let association = lower
            .strip_suffix("_id")
            .filter(|base| !base.is_empty())
            .map(str::to_string);
        Self {
            name:           name.into(),
            table:          table.map(Into::into),
            is_foreign_key: association.is_some(),
            association
        }
    }
}

/// Classification of the right-hand side of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Parameter,
    Literal,
    Column,
    Subquery
}

/// One comparison from the WHERE clause, in parse order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhereCondition {
    pub column:     ColumnReference,
    pub operator:   CompactString,
    pub value_kind: ValueKind,
    pub value:      Option<String>
}

/// One JOIN in the FROM clause
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinInfo {
    pub kind:      CompactString,
    pub table:     CompactString,
    pub condition: Option<String>
}
