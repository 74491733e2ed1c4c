use compact_str::CompactString;
use sqlparser::ast::TableFactor;

use super::{ExtractionContext, set_expr::extract_from_set_expr, unquote};

pub fn extract_from_table_factor(table_factor: &TableFactor, ctx: &mut ExtractionContext) {
    match table_factor {
        TableFactor::Table {
            name,
            alias,
            ..
        } => {
            let alias = alias.as_ref().map(|a| a.name.value.as_str().into());
            ctx.add_table(unquote(&name.to_string()), alias);
        }
        TableFactor::Derived {
            subquery, ..
        } => {
            ctx.subquery_count += 1;
            ctx.depth += 1;
            extract_from_set_expr(&subquery.body, ctx);
            ctx.depth -= 1;
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            extract_from_table_factor(&table_with_joins.relation, ctx);
            for join in &table_with_joins.joins {
                extract_from_table_factor(&join.relation, ctx);
            }
        }
        _ => {}
    }
}

/// Display name for a join target
pub fn table_factor_name(table_factor: &TableFactor) -> CompactString {
    match table_factor {
        TableFactor::Table {
            name, ..
        } => unquote(&name.to_string()),
        TableFactor::Derived {
            alias, ..
        } => match alias {
            Some(alias) => format!("(subquery) AS {}", alias.name.value).into(),
            None => "(subquery)".into()
        },
        _ => "(unknown)".into()
    }
}
