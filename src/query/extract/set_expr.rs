use sqlparser::ast::{
    Expr, JoinConstraint, JoinOperator, SelectItem, SetExpr, Value
};

use super::{
    ExtractionContext, ProjectionShape,
    expr::{extract_aggregations, extract_columns_from_expr, extract_conditions, extract_nested_queries},
    table::{extract_from_table_factor, table_factor_name}
};
use crate::query::types::JoinInfo;

pub fn extract_from_set_expr(set_expr: &SetExpr, ctx: &mut ExtractionContext) {
    match set_expr {
        SetExpr::Select(select) => {
            if ctx.is_outermost() && ctx.projection.is_none() {
                ctx.projection = Some(projection_shape(&select.projection));
            }
            for item in &select.projection {
                if let SelectItem::UnnamedExpr(expr)
                | SelectItem::ExprWithAlias {
                    expr, ..
                } = item
                {
                    extract_columns_from_expr(expr, &mut ctx.columns);
                    extract_aggregations(expr, &mut ctx.aggregations);
                    extract_nested_queries(expr, ctx);
                }
            }
            for table in &select.from {
                extract_from_table_factor(&table.relation, ctx);
                for join in &table.joins {
                    extract_from_table_factor(&join.relation, ctx);
                    let (kind, constraint) = match &join.join_operator {
                        JoinOperator::Inner(c) => ("INNER JOIN", Some(c)),
                        JoinOperator::LeftOuter(c) => ("LEFT JOIN", Some(c)),
                        JoinOperator::RightOuter(c) => ("RIGHT JOIN", Some(c)),
                        JoinOperator::FullOuter(c) => ("FULL JOIN", Some(c)),
                        _ => ("JOIN", None)
                    };
                    let mut condition = None;
                    if let Some(JoinConstraint::On(expr)) = constraint {
                        extract_columns_from_expr(expr, &mut ctx.columns);
                        condition = Some(expr.to_string());
                    }
                    if ctx.is_outermost() {
                        ctx.joins.push(JoinInfo {
                            kind: kind.into(),
                            table: table_factor_name(&join.relation),
                            condition
                        });
                    }
                }
            }
            if let Some(selection) = &select.selection {
                extract_columns_from_expr(selection, &mut ctx.columns);
                if ctx.is_outermost() {
                    extract_conditions(selection, &mut ctx.conditions);
                }
                extract_nested_queries(selection, ctx);
            }
            if let Some(having) = &select.having {
                extract_aggregations(having, &mut ctx.aggregations);
            }
        }
        SetExpr::SetOperation {
            left,
            right,
            ..
        } => {
            extract_from_set_expr(left, ctx);
            ctx.depth += 1;
            extract_from_set_expr(right, ctx);
            ctx.depth -= 1;
        }
        SetExpr::Query(query) => {
            extract_from_set_expr(&query.body, ctx);
        }
        _ => {}
    }
}

fn projection_shape(projection: &[SelectItem]) -> ProjectionShape {
    let [item] = projection else {
        return ProjectionShape::Other;
    };
    let expr = match item {
        SelectItem::UnnamedExpr(expr)
        | SelectItem::ExprWithAlias {
            expr, ..
        } => expr,
        _ => return ProjectionShape::Other
    };
    match expr {
        Expr::Value(val) if matches!(&val.value, Value::Number(n, _) if n.as_str() == "1") => {
            ProjectionShape::SingleOne
        }
        Expr::Function(func) if func.name.to_string().eq_ignore_ascii_case("count") => {
            ProjectionShape::SingleCount
        }
        _ => ProjectionShape::Other
    }
}
