//! Semantic SQL analysis.
//!
//! Turns one SQL statement into a [`QueryAnalysis`]: intent, tables,
//! columns, WHERE comparisons, joins, clause flags and a complexity class.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────┐   MySQL    ┌──────────┐   ok   ┌─────────────────┐
//! │ raw SQL  │──────────▶│ sqlparser │──────▶│ ExtractionContext│──▶ QueryAnalysis
//! └──────────┘  Postgres  └──────────┘        └─────────────────┘
//!                   │ both fail
//!                   ▼
//!             ┌───────────┐
//!             │  fallback │  regex heuristics, complexity = unknown
//!             └───────────┘
//! ```
//!
//! Analysis never fails: parser errors degrade to the regex fallback.

mod completeness;
mod extract;
mod fallback;
mod hints;
mod types;

pub use completeness::{Completeness, CompletenessLabel, match_completeness};
use extract::{
    ExtractionContext, ProjectionShape, extract_columns_from_expr, extract_conditions,
    extract_from_set_expr, extract_from_table_factor, extract_nested_queries, unquote
};
pub use hints::{fingerprint, rails_patterns, verification_command};
use sqlparser::{
    ast::{FromTable, LimitClause, OrderByKind, Statement, Update},
    dialect::{Dialect, MySqlDialect, PostgreSqlDialect},
    parser::Parser
};
pub use types::{
    ColumnReference, ColumnVec, Complexity, JoinInfo, ParseSource, QueryAnalysis, QueryIntent,
    TableReference, ValueKind, WhereCondition
};

use crate::error::{AppResult, query_parse_error};

/// SQL dialect for parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SqlDialect {
    #[default]
    MySQL,
    PostgreSQL
}

impl SqlDialect {
    /// Dialects tried in order by [`analyze`]
    pub const FALLBACK_ORDER: [SqlDialect; 2] = [SqlDialect::MySQL, SqlDialect::PostgreSQL];

    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::MySQL => Box::new(MySqlDialect {}),
            Self::PostgreSQL => Box::new(PostgreSqlDialect {})
        }
    }

    fn parse_source(self) -> ParseSource {
        match self {
            Self::MySQL => ParseSource::Mysql,
            Self::PostgreSQL => ParseSource::Postgres
        }
    }
}

/// Analyze one SQL statement, trying MySQL then PostgreSQL.
///
/// ```
/// use sql_source_tracer::query::{QueryIntent, analyze};
///
/// let analysis = analyze("SELECT 1 AS one FROM users WHERE email = ? LIMIT 1");
/// assert_eq!(analysis.intent, QueryIntent::ExistenceCheck);
/// assert_eq!(analysis.primary_model(), Some("User"));
/// ```
pub fn analyze(sql: &str) -> QueryAnalysis {
    analyze_with(sql, &SqlDialect::FALLBACK_ORDER)
}

/// Analyze with an explicit dialect order
pub fn analyze_with(sql: &str, dialects: &[SqlDialect]) -> QueryAnalysis {
    let sql = sql.trim();
    let mut last_error = None;
    for dialect in dialects {
        match parse_first_statement(sql, *dialect) {
            Ok(Some(statement)) => return analyze_statement(sql, statement, dialect.parse_source()),
            Ok(None) => break,
            Err(e) => last_error = Some(e)
        }
    }
    if let Some(err) = last_error {
        tracing::debug!(error = %err, "sql parse failed, using regex fallback");
    }
    fallback::analyze(sql)
}

fn parse_first_statement(sql: &str, dialect: SqlDialect) -> AppResult<Option<Statement>> {
    let parser_dialect = dialect.into_parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| query_parse_error(e.to_string()))?;
    Ok(statements.into_iter().next())
}

fn analyze_statement(raw: &str, statement: Statement, source: ParseSource) -> QueryAnalysis {
    let mut analysis = QueryAnalysis::empty(raw, source);
    let mut ctx = ExtractionContext::default();

    match statement {
        Statement::Query(query) => {
            if let Some(limit_clause) = &query.limit_clause {
                read_limit_clause(limit_clause, &mut analysis);
            }
            if let Some(order_by) = &query.order_by {
                analysis.has_order = true;
                if let OrderByKind::Expressions(exprs) = &order_by.kind {
                    let mut cols = indexmap::IndexSet::new();
                    for expr in exprs {
                        extract_columns_from_expr(&expr.expr, &mut cols);
                    }
                    analysis.order_columns = cols.into_iter().collect();
                }
            }
            extract_from_set_expr(&query.body, &mut ctx);
            analysis.intent = match ctx.projection.unwrap_or_default() {
                ProjectionShape::SingleOne if analysis.has_limit => QueryIntent::ExistenceCheck,
                ProjectionShape::SingleCount => QueryIntent::CountAggregate,
                _ => QueryIntent::DataRetrieval
            };
        }
        Statement::Insert(insert) => {
            analysis.intent = QueryIntent::DataInsertion;
            ctx.add_table(unquote(&insert.table.to_string()), None);
            for col in &insert.columns {
                let name = unquote(&col.to_string());
                ctx.columns.insert(name.clone());
                analysis.write_columns.push(name);
            }
        }
        Statement::Update(Update {
            table,
            assignments,
            selection,
            ..
        }) => {
            analysis.intent = QueryIntent::DataUpdate;
            extract_from_table_factor(&table.relation, &mut ctx);
            for assignment in &assignments {
                let name = unquote(&assignment.target.to_string());
                ctx.columns.insert(name.clone());
                analysis.write_columns.push(name);
            }
            if let Some(sel) = selection {
                extract_columns_from_expr(&sel, &mut ctx.columns);
                extract_conditions(&sel, &mut ctx.conditions);
                extract_nested_queries(&sel, &mut ctx);
            }
        }
        Statement::Delete(delete) => {
            analysis.intent = QueryIntent::DataDeletion;
            let from_items = match &delete.from {
                FromTable::WithFromKeyword(items) | FromTable::WithoutKeyword(items) => items
            };
            for item in from_items {
                extract_from_table_factor(&item.relation, &mut ctx);
            }
            if let Some(sel) = &delete.selection {
                extract_columns_from_expr(sel, &mut ctx.columns);
                extract_conditions(sel, &mut ctx.conditions);
                extract_nested_queries(sel, &mut ctx);
            }
        }
        _ => {
            analysis.intent = keyword_intent(raw);
        }
    }

    finish(analysis, ctx)
}

fn read_limit_clause(limit_clause: &LimitClause, analysis: &mut QueryAnalysis) {
    use sqlparser::ast::{Expr, Value};

    let number = |expr: &Expr| -> Option<u64> {
        match expr {
            Expr::Value(val) => match &val.value {
                Value::Number(n, _) => n.parse().ok(),
                _ => None
            },
            _ => None
        }
    };
    match limit_clause {
        LimitClause::LimitOffset {
            limit,
            offset,
            ..
        } => {
            if let Some(limit) = limit {
                analysis.has_limit = true;
                analysis.limit = number(limit);
            }
            if let Some(offset) = offset {
                analysis.has_offset = true;
                analysis.offset = number(&offset.value);
            }
        }
        LimitClause::OffsetCommaLimit {
            offset,
            limit,
            ..
        } => {
            analysis.has_limit = true;
            analysis.has_offset = true;
            analysis.limit = number(limit);
            analysis.offset = number(offset);
        }
    }
}

/// Intent for statements the AST walker does not model
fn keyword_intent(raw: &str) -> QueryIntent {
    let upper = raw.trim_start().to_uppercase();
    let first = upper.split_whitespace().next().unwrap_or_default();
    match first {
        "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" => {
            QueryIntent::TransactionControl
        }
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" => QueryIntent::SchemaOperation,
        _ => QueryIntent::DataRetrieval
    }
}

fn finish(mut analysis: QueryAnalysis, ctx: ExtractionContext) -> QueryAnalysis {
    analysis.tables = ctx
        .tables
        .iter()
        .map(|(name, alias)| TableReference::new(name, alias.as_deref()))
        .collect();
    // Unqualified columns can only be attributed when one table is involved
    let primary = match analysis.tables.as_slice() {
        [only] => Some(only.name.clone()),
        _ => None
    };
    analysis.columns = ctx
        .columns
        .iter()
        .map(|c| ColumnReference::new(c, primary.as_deref()))
        .collect();
    analysis.where_conditions = ctx.conditions;
    analysis.joins = ctx.joins;
    analysis.aggregations = ctx.aggregations.into_iter().collect();
    analysis.subquery_count = ctx.subquery_count;
    analysis.complexity = Complexity::from_score(complexity_score(&analysis));
    analysis.rails_patterns = rails_patterns(&analysis);
    analysis
}

/// Weighted structural score: tables, joins, subqueries, conditions, aggregation
pub fn complexity_score(analysis: &QueryAnalysis) -> u32 {
    let mut score = 0;
    if analysis.tables.len() > 1 {
        score += 2;
    }
    score += analysis.joins.len() as u32;
    score += analysis.subquery_count * 2;
    if analysis.where_conditions.len() > 1 {
        score += 1;
    }
    if !analysis.aggregations.is_empty() {
        score += 1;
    }
    score
}
