//! Fingerprints and ORM-idiom hints derived from a [`QueryAnalysis`].
//!
//! Hints are explanations for humans. They are never used as search
//! patterns.

use super::types::{QueryAnalysis, QueryIntent, ValueKind, WhereCondition};

/// Parameter-erased signature of the statement.
///
/// ```
/// use sql_source_tracer::query::{analyze, fingerprint};
///
/// let analysis = analyze("SELECT COUNT(*) FROM members WHERE company_id = 42");
/// assert_eq!(fingerprint(&analysis), "SELECT COUNT(*) FROM members WHERE company_id = ?");
/// ```
pub fn fingerprint(analysis: &QueryAnalysis) -> String {
    let table = analysis
        .primary_table()
        .map(|t| t.name.as_str())
        .unwrap_or("unknown_table");
    let where_clause = where_fingerprint(&analysis.where_conditions);

    match analysis.intent {
        QueryIntent::ExistenceCheck => {
            let mut fp = format!("SELECT 1 AS one FROM {}{}", table, where_clause);
            if analysis.has_limit {
                fp.push_str(" LIMIT 1");
            }
            fp
        }
        QueryIntent::CountAggregate => format!("SELECT COUNT(*) FROM {}{}", table, where_clause),
        QueryIntent::DataInsertion => format!("INSERT INTO {} (...)", table),
        QueryIntent::DataUpdate => {
            let set = if analysis.write_columns.is_empty() {
                String::from("...")
            } else {
                analysis
                    .write_columns
                    .iter()
                    .map(|c| format!("{} = ?", c))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!("UPDATE {} SET {}{}", table, set, where_clause)
        }
        QueryIntent::DataDeletion => format!("DELETE FROM {}{}", table, where_clause),
        QueryIntent::TransactionControl | QueryIntent::SchemaOperation => analysis
            .raw_sql
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
        _ => {
            let mut fp = format!("SELECT * FROM {}{}", table, where_clause);
            if !analysis.order_columns.is_empty() {
                let cols: Vec<&str> = analysis.order_columns.iter().map(|c| c.as_str()).collect();
                fp.push_str(&format!(" ORDER BY {}", cols.join(", ")));
            }
            if analysis.has_limit {
                fp.push_str(" LIMIT ?");
            }
            if analysis.has_offset {
                fp.push_str(" OFFSET ?");
            }
            fp
        }
    }
}

fn where_fingerprint(conditions: &[WhereCondition]) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = conditions
        .iter()
        .map(|c| match c.operator.as_str() {
            "IS NULL" | "IS NOT NULL" => format!("{} {}", c.column.name, c.operator),
            "IN" | "NOT IN" => format!("{} {} (?)", c.column.name, c.operator),
            op => match (c.value_kind, &c.value) {
                (ValueKind::Column, Some(other)) => format!("{} {} {}", c.column.name, op, other),
                _ => format!("{} {} ?", c.column.name, op)
            }
        })
        .collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// `company_id: value, status: value`
fn hash_args(conditions: &[WhereCondition]) -> String {
    conditions
        .iter()
        .map(|c| format!("{}: value", c.column.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Idiomatic ORM calls that could emit this statement
pub fn rails_patterns(analysis: &QueryAnalysis) -> Vec<String> {
    let Some(table) = analysis.primary_table() else {
        return Vec::new();
    };
    let model = table.model.as_str();
    let plural = table.name.rsplit('.').next().unwrap_or(&table.name).to_string();
    let singular = table.singular();
    let args = hash_args(&analysis.where_conditions);
    let associations: Vec<&str> = analysis
        .foreign_keys()
        .filter_map(|c| c.association.as_deref())
        .collect();
    let mut patterns = Vec::new();

    match analysis.intent {
        QueryIntent::ExistenceCheck => {
            if args.is_empty() {
                patterns.push(format!("{}.exists?", model));
            } else {
                patterns.push(format!("{}.exists?({})", model, args));
                patterns.push(format!("{}.where({}).exists?", model, args));
                patterns.push(format!("{}.find_by({}).present?", model, args));
            }
            for assoc in &associations {
                patterns.push(format!("{}.{}.exists?", assoc, plural));
            }
        }
        QueryIntent::CountAggregate => {
            patterns.push(format!("{}.count", model));
            patterns.push(format!("{}.size", model));
            if !args.is_empty() {
                patterns.push(format!("{}.where({}).count", model, args));
            }
            for assoc in &associations {
                patterns.push(format!("{}.{}.count", assoc, plural));
            }
        }
        QueryIntent::DataInsertion => {
            patterns.push(format!("{}.create(...)", model));
            patterns.push(format!("{}.new(...).save", model));
            patterns.push(format!("build_{}(...)", singular));
        }
        QueryIntent::DataUpdate => {
            patterns.push(format!("{}.update(...)", model));
            patterns.push(format!("@{}.save", singular));
            patterns.push(format!("{}.update_all(...)", model));
        }
        QueryIntent::DataDeletion => {
            patterns.push(format!("@{}.destroy", singular));
            if !args.is_empty() {
                patterns.push(format!("{}.where({}).delete_all", model, args));
                patterns.push(format!("{}.where({}).destroy_all", model, args));
            }
        }
        QueryIntent::TransactionControl | QueryIntent::SchemaOperation => {}
        _ => {
            if args.is_empty() {
                patterns.push(format!("{}.all", model));
            } else {
                patterns.push(format!("{}.where({})", model, args));
                patterns.push(format!("{}.find_by({})", model, args));
                for assoc in &associations {
                    patterns.push(format!("{}.{}.where(...)", assoc, plural));
                }
            }
            if analysis.has_order {
                patterns.push(format!("{}.order(...)", model));
            }
            if analysis.has_limit {
                match analysis.limit {
                    Some(1) => {
                        patterns.push(format!("{}.first", model));
                        patterns.push(format!("{}.last", model));
                    }
                    Some(n) => patterns.push(format!("{}.limit({})", model, n)),
                    None => patterns.push(format!("{}.limit(...)", model))
                }
            }
            if analysis.has_offset {
                patterns.push(format!("{}.offset(...)", model));
            }
        }
    }
    patterns
}

/// `rails runner` one-liner that reproduces the statement through the ORM.
///
/// Returned for the caller to run manually; nothing here executes it.
pub fn verification_command(analysis: &QueryAnalysis) -> Option<String> {
    let model = analysis.primary_model()?;
    let args = analysis
        .where_conditions
        .iter()
        .filter(|c| c.operator == "=")
        .map(|c| {
            let value = match (c.value_kind, &c.value) {
                (ValueKind::Literal, Some(v)) if v.parse::<f64>().is_ok() => v.clone(),
                (ValueKind::Literal, Some(v)) => format!("\"{}\"", v),
                _ => String::from("nil")
            };
            format!("{}: {}", c.column.name, value)
        })
        .collect::<Vec<_>>()
        .join(", ");
    let relation = if args.is_empty() {
        model.to_string()
    } else {
        format!("{}.where({})", model, args)
    };
    let call = match analysis.intent {
        QueryIntent::ExistenceCheck => format!("{}.exists?", relation),
        QueryIntent::CountAggregate => format!("{}.count", relation),
        QueryIntent::DataRetrieval => {
            let mut call = relation;
            if let Some(limit) = analysis.limit {
                call.push_str(&format!(".limit({})", limit));
            }
            if let Some(offset) = analysis.offset {
                call.push_str(&format!(".offset({})", offset));
            }
            format!("{}.to_sql", call)
        }
        _ => return None
    };
    Some(format!("rails runner 'puts {}'", call))
}
