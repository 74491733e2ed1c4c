use compact_str::CompactString;
use indexmap::IndexSet;
use sqlparser::ast::{BinaryOperator, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, Value};

use super::{ExtractionContext, set_expr::extract_from_set_expr};
use crate::query::types::{ColumnReference, ValueKind, WhereCondition};

const AGGREGATES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

pub fn extract_columns_from_expr(expr: &Expr, columns: &mut IndexSet<CompactString>) {
    match expr {
        Expr::Identifier(ident) => {
            columns.insert(ident.value.as_str().into());
        }
        Expr::CompoundIdentifier(idents) => {
            if let Some(col) = idents.last() {
                columns.insert(col.value.as_str().into());
            }
        }
        Expr::BinaryOp {
            left,
            right,
            ..
        } => {
            extract_columns_from_expr(left, columns);
            extract_columns_from_expr(right, columns);
        }
        Expr::UnaryOp {
            expr, ..
        } => {
            extract_columns_from_expr(expr, columns);
        }
        Expr::InList {
            expr,
            list,
            ..
        } => {
            extract_columns_from_expr(expr, columns);
            for item in list {
                extract_columns_from_expr(item, columns);
            }
        }
        Expr::InSubquery {
            expr, ..
        } => {
            extract_columns_from_expr(expr, columns);
        }
        Expr::Between {
            expr,
            low,
            high,
            ..
        } => {
            extract_columns_from_expr(expr, columns);
            extract_columns_from_expr(low, columns);
            extract_columns_from_expr(high, columns);
        }
        Expr::Like {
            expr, ..
        }
        | Expr::ILike {
            expr, ..
        } => {
            extract_columns_from_expr(expr, columns);
        }
        Expr::IsNull(e) | Expr::IsNotNull(e) | Expr::Nested(e) => {
            extract_columns_from_expr(e, columns);
        }
        Expr::Function(func) => {
            for e in function_args(&func.args) {
                extract_columns_from_expr(e, columns);
            }
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(op) = operand {
                extract_columns_from_expr(op, columns);
            }
            for case_when in conditions {
                extract_columns_from_expr(&case_when.condition, columns);
                extract_columns_from_expr(&case_when.result, columns);
            }
            if let Some(else_res) = else_result {
                extract_columns_from_expr(else_res, columns);
            }
        }
        Expr::Cast {
            expr, ..
        } => {
            extract_columns_from_expr(expr, columns);
        }
        _ => {}
    }
}

/// Record aggregate function names (`COUNT`, `SUM`, ...) found in `expr`
pub fn extract_aggregations(expr: &Expr, aggregations: &mut IndexSet<CompactString>) {
    match expr {
        Expr::Function(func) => {
            let name = func.name.to_string().to_uppercase();
            if AGGREGATES.contains(&name.as_str()) {
                aggregations.insert(name.into());
            }
            for e in function_args(&func.args) {
                extract_aggregations(e, aggregations);
            }
        }
        Expr::BinaryOp {
            left,
            right,
            ..
        } => {
            extract_aggregations(left, aggregations);
            extract_aggregations(right, aggregations);
        }
        Expr::Nested(e)
        | Expr::Cast {
            expr: e, ..
        } => extract_aggregations(e, aggregations),
        _ => {}
    }
}

/// Column reference for a bare or qualified identifier
pub fn column_ref(expr: &Expr) -> Option<ColumnReference> {
    match expr {
        Expr::Identifier(ident) => Some(ColumnReference::new(&ident.value, None)),
        Expr::CompoundIdentifier(idents) => {
            let col = idents.last()?;
            let table = idents
                .len()
                .checked_sub(2)
                .and_then(|i| idents.get(i))
                .map(|t| t.value.as_str());
            Some(ColumnReference::new(&col.value, table))
        }
        Expr::Nested(e) => column_ref(e),
        _ => None
    }
}

/// Collect comparisons from a WHERE expression in parse order.
///
/// AND/OR trees are flattened. Comparisons whose left side is not a column
/// are mirrored when the right side is one (`5 < age`).
pub fn extract_conditions(expr: &Expr, conditions: &mut Vec<WhereCondition>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And | BinaryOperator::Or,
            right
        } => {
            extract_conditions(left, conditions);
            extract_conditions(right, conditions);
        }
        Expr::BinaryOp {
            left,
            op,
            right
        } => {
            if let Some(column) = column_ref(left) {
                push_condition(conditions, column, &op.to_string(), right);
            } else if let Some(column) = column_ref(right) {
                push_condition(conditions, column, &op.to_string(), left);
            }
        }
        Expr::Nested(e) => extract_conditions(e, conditions),
        Expr::InList {
            expr,
            list,
            negated
        } => {
            if let Some(column) = column_ref(expr) {
                let op = if *negated { "NOT IN" } else { "IN" };
                let (value_kind, _) = list
                    .first()
                    .map(classify_value)
                    .unwrap_or((ValueKind::Literal, None));
                let rendered = list.iter().map(|e| e.to_string()).collect::<Vec<_>>();
                conditions.push(WhereCondition {
                    column,
                    operator: op.into(),
                    value_kind,
                    value: Some(format!("({})", rendered.join(", ")))
                });
            }
        }
        Expr::InSubquery {
            expr,
            negated,
            ..
        } => {
            if let Some(column) = column_ref(expr) {
                let op = if *negated { "NOT IN" } else { "IN" };
                conditions.push(WhereCondition {
                    column,
                    operator: op.into(),
                    value_kind: ValueKind::Subquery,
                    value: None
                });
            }
        }
        Expr::Between {
            expr,
            negated,
            low,
            ..
        } => {
            if let Some(column) = column_ref(expr) {
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                push_condition(conditions, column, op, low);
            }
        }
        Expr::Like {
            expr,
            negated,
            pattern,
            ..
        }
        | Expr::ILike {
            expr,
            negated,
            pattern,
            ..
        } => {
            if let Some(column) = column_ref(expr) {
                let op = if *negated { "NOT LIKE" } else { "LIKE" };
                push_condition(conditions, column, op, pattern);
            }
        }
        Expr::IsNull(e) | Expr::IsNotNull(e) => {
            if let Some(column) = column_ref(e) {
                let op = if matches!(expr, Expr::IsNull(_)) { "IS NULL" } else { "IS NOT NULL" };
                conditions.push(WhereCondition {
                    column,
                    operator: op.into(),
                    value_kind: ValueKind::Literal,
                    value: None
                });
            }
        }
        _ => {}
    }
}

fn push_condition(
    conditions: &mut Vec<WhereCondition>,
    column: ColumnReference,
    op: &str,
    value: &Expr
) {
    let (value_kind, value) = classify_value(value);
    conditions.push(WhereCondition {
        column,
        operator: op.into(),
        value_kind,
        value
    });
}

/// Classify a comparison's right-hand side
pub fn classify_value(expr: &Expr) -> (ValueKind, Option<String>) {
    match expr {
        Expr::Value(val) => match &val.value {
            Value::Placeholder(p) => (ValueKind::Parameter, Some(p.clone())),
            other => {
                let rendered = other.to_string();
                (ValueKind::Literal, Some(rendered.trim_matches('\'').to_string()))
            }
        },
        Expr::UnaryOp {
            expr, ..
        } => {
            let (kind, value) = classify_value(expr);
            (kind, value.map(|v| format!("-{}", v)))
        }
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
            (ValueKind::Column, Some(expr.to_string()))
        }
        Expr::Subquery(_) => (ValueKind::Subquery, None),
        Expr::Nested(e)
        | Expr::Cast {
            expr: e, ..
        } => classify_value(e),
        other => (ValueKind::Literal, Some(other.to_string()))
    }
}

/// Count nested queries inside `expr` and collect their tables.
pub fn extract_nested_queries(expr: &Expr, ctx: &mut ExtractionContext) {
    match expr {
        Expr::Subquery(query)
        | Expr::InSubquery {
            subquery: query, ..
        }
        | Expr::Exists {
            subquery: query, ..
        } => {
            ctx.subquery_count += 1;
            ctx.depth += 1;
            extract_from_set_expr(&query.body, ctx);
            ctx.depth -= 1;
            if let Expr::InSubquery {
                expr, ..
            } = expr
            {
                extract_nested_queries(expr, ctx);
            }
        }
        Expr::BinaryOp {
            left,
            right,
            ..
        } => {
            extract_nested_queries(left, ctx);
            extract_nested_queries(right, ctx);
        }
        Expr::UnaryOp {
            expr: e, ..
        }
        | Expr::Nested(e) => extract_nested_queries(e, ctx),
        Expr::InList {
            expr,
            list,
            ..
        } => {
            extract_nested_queries(expr, ctx);
            for item in list {
                extract_nested_queries(item, ctx);
            }
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(op) = operand {
                extract_nested_queries(op, ctx);
            }
            for cw in conditions {
                extract_nested_queries(&cw.condition, ctx);
                extract_nested_queries(&cw.result, ctx);
            }
            if let Some(e) = else_result {
                extract_nested_queries(e, ctx);
            }
        }
        _ => {}
    }
}

fn function_args(args: &FunctionArguments) -> impl Iterator<Item = &Expr> {
    let list = match args {
        FunctionArguments::List(arg_list) => arg_list.args.as_slice(),
        _ => &[]
    };
    list.iter().filter_map(|arg| match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Some(e),
        _ => None
    })
}
