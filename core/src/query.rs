//! Compiles parsed predicates into one parameterized SQL filter.
//!
//! User values only ever travel in the argument list; the clause text is
//! assembled from fixed fragments.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::filter::{Field, FilterValue, Operator, Predicate};

/// Absent ratings sort after every present rating; `id` keeps ties stable.
pub const ORDER_BY: &str = "ORDER BY rating IS NULL, rating DESC, id ASC";

pub const NUTRIENT_AMOUNT_FN: &str = "nutrient_amount";

/// A filter clause with `?` placeholders and the values bound to them, in
/// placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub clause: String,
    pub args: Vec<SqlValue>,
}

impl CompiledFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// The clause as a `WHERE` suffix, or nothing when unfiltered.
    #[must_use]
    pub fn where_sql(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clause)
        }
    }
}

/// Conjoin all predicates. An empty slice compiles to an empty filter.
#[must_use]
pub fn compile(predicates: &[Predicate]) -> CompiledFilter {
    let mut conditions = Vec::with_capacity(predicates.len());
    let mut args = Vec::new();

    for predicate in predicates {
        let subject = match predicate.field {
            Field::Calories => {
                args.push(SqlValue::Text("calories".to_string()));
                format!("{NUTRIENT_AMOUNT_FN}(nutrients, ?)")
            }
            field => field.param_name().to_string(),
        };

        let condition = match predicate.op {
            Operator::Contains => {
                args.push(SqlValue::Text(like_pattern(&predicate.value)));
                format!("{subject} LIKE ? ESCAPE '\\'")
            }
            Operator::Exact => {
                args.push(sql_value(&predicate.value));
                format!("{subject} = ?")
            }
            Operator::Compare(cmp) => {
                args.push(sql_value(&predicate.value));
                format!("{subject} {} ?", cmp.as_sql())
            }
        };
        conditions.push(condition);
    }

    CompiledFilter {
        clause: conditions.join(" AND "),
        args,
    }
}

fn sql_value(value: &FilterValue) -> SqlValue {
    match value {
        FilterValue::Text(s) => SqlValue::Text(s.clone()),
        FilterValue::Float(f) => SqlValue::Real(*f),
        FilterValue::Int(i) => SqlValue::Integer(*i),
    }
}

fn like_pattern(value: &FilterValue) -> String {
    let text = match value {
        FilterValue::Text(s) => s.clone(),
        FilterValue::Float(f) => f.to_string(),
        FilterValue::Int(i) => i.to_string(),
    };
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Numeric amount of one nutrient inside serialized nutrients text.
///
/// `{"calories": "389 kcal"}` with `calories` gives `Some(389)`. Missing
/// entries, malformed JSON, and values without a leading number give `None`.
#[must_use]
pub fn nutrient_amount(nutrients: &str, name: &str) -> Option<i64> {
    let map: serde_json::Map<String, Value> = serde_json::from_str(nutrients).ok()?;
    match map.get(name)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => leading_amount(s),
        _ => None,
    }
}

fn leading_amount(text: &str) -> Option<i64> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let len = compact
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .count();
    compact[..len].parse::<f64>().ok().and_then(truncate)
}

fn truncate(f: f64) -> Option<i64> {
    f.is_finite().then(|| f.trunc() as i64)
}

/// Register the scalar functions compiled filters rely on.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        NUTRIENT_AMOUNT_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let nutrients = ctx.get::<Option<String>>(0)?;
            let name = ctx.get::<String>(1)?;
            Ok(nutrients
                .as_deref()
                .and_then(|text| nutrient_amount(text, &name)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Comparator, SearchParams, parse_param};

    fn predicate(name: &str, raw: &str) -> Predicate {
        parse_param(name, raw).unwrap().unwrap()
    }

    #[test]
    fn test_empty_compiles_to_nothing() {
        let compiled = compile(&[]);
        assert!(compiled.is_empty());
        assert!(compiled.args.is_empty());
        assert_eq!(compiled.where_sql(), "");
    }

    #[test]
    fn test_conjunction_with_ordered_args() {
        let compiled = compile(&[
            predicate("cuisine", "Italian"),
            predicate("total_time", "<=30"),
        ]);
        assert_eq!(compiled.clause, "cuisine = ? AND total_time <= ?");
        assert_eq!(
            compiled.args,
            vec![SqlValue::Text("Italian".to_string()), SqlValue::Integer(30)]
        );
    }

    #[test]
    fn test_values_never_reach_clause_text() {
        let params = SearchParams {
            title: Some("'; DROP TABLE recipes; --".to_string()),
            cuisine: Some("x' OR '1'='1".to_string()),
            ..SearchParams::default()
        };
        let compiled = compile(&params.predicates());
        assert!(!compiled.clause.contains("DROP"));
        assert!(!compiled.clause.contains("OR"));
        assert_eq!(compiled.clause.matches('?').count(), compiled.args.len());
    }

    #[test]
    fn test_title_like_pattern_is_escaped() {
        let compiled = compile(&[predicate("title", "50%_off")]);
        assert_eq!(compiled.clause, "title LIKE ? ESCAPE '\\'");
        assert_eq!(
            compiled.args,
            vec![SqlValue::Text("%50\\%\\_off%".to_string())]
        );
    }

    #[test]
    fn test_calories_uses_nutrient_amount() {
        let compiled = compile(&[predicate("calories", ">=300")]);
        assert_eq!(
            compiled.clause,
            format!("{NUTRIENT_AMOUNT_FN}(nutrients, ?) >= ?")
        );
        assert!(compiled.clause.starts_with("nutrient_amount("));
        assert_eq!(
            compiled.args,
            vec![SqlValue::Text("calories".to_string()), SqlValue::Integer(300)]
        );
    }

    #[test]
    fn test_rating_comparator_sql() {
        for (raw, sql) in [(">4", ">"), ("<4", "<"), ("4", "=")] {
            let compiled = compile(&[predicate("rating", raw)]);
            assert_eq!(compiled.clause, format!("rating {sql} ?"));
        }
        assert_eq!(Comparator::Ge.as_sql(), ">=");
    }

    #[test]
    fn test_nutrient_amount() {
        let nutrients = r#"{"calories": "389 kcal", "fatContent": "12 g", "sodium": 410, "fiber": "n/a"}"#;
        assert_eq!(nutrient_amount(nutrients, "calories"), Some(389));
        assert_eq!(nutrient_amount(nutrients, "fatContent"), Some(12));
        assert_eq!(nutrient_amount(nutrients, "sodium"), Some(410));
        assert_eq!(nutrient_amount(nutrients, "fiber"), None);
        assert_eq!(nutrient_amount(nutrients, "protein"), None);
        assert_eq!(nutrient_amount("{}", "calories"), None);
        assert_eq!(nutrient_amount("not json", "calories"), None);
    }

    #[test]
    fn test_leading_amount_variants() {
        assert_eq!(leading_amount("1,200 kcal"), Some(1200));
        assert_eq!(leading_amount(" 389.7 kcal "), Some(389));
        assert_eq!(leading_amount("kcal"), None);
        assert_eq!(leading_amount(""), None);
    }

    #[test]
    fn test_registered_function_in_sql() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let amount: Option<i64> = conn
            .query_row(
                "SELECT nutrient_amount(?1, 'calories')",
                [r#"{"calories": "250 kcal"}"#],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(amount, Some(250));

        let missing: Option<i64> = conn
            .query_row("SELECT nutrient_amount(NULL, 'calories')", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(missing, None);
    }
}
