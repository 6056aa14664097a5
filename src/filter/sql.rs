use serde_json::Value;

use super::predicate::{Field, Predicate};
use crate::services::naming::collation_key;

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Renders a [`Predicate`] into a parameterised WHERE clause.
pub struct SqlWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl SqlWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(predicate: &Predicate, starting_param_index: usize) -> SqlResult {
        let mut sql_where = Self::new(starting_param_index);
        let query = sql_where.build(predicate);
        SqlResult { query, params: sql_where.param_values }
    }

    fn build(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::All => "1=1".to_string(),
            Predicate::Nothing => "1=0".to_string(),
            Predicate::Eq(field, value) => {
                if value.is_null() {
                    format!("{} IS NULL", quote(*field))
                } else {
                    format!("{} = {}", quote(*field), self.param(*field, value.clone()))
                }
            }
            Predicate::In(field, values) => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let params: Vec<String> = values.iter().map(|v| self.param(*field, v.clone())).collect();
                format!("{} IN ({})", quote(*field), params.join(", "))
            }
            Predicate::NameEq(field, name) => match field.collation_column() {
                Some(key) => format!("{} = {}", quote(key), self.param(key, Value::String(collation_key(name)))),
                None => format!("lower({}) = lower({})", quote(*field), self.param(*field, Value::String(name.trim().to_string()))),
            },
            Predicate::Contains(field, needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                format!("{} ILIKE {}", quote(*field), self.param(*field, Value::String(pattern)))
            }
            Predicate::Since(field, at) => {
                format!("{} >= {}", quote(*field), self.param(*field, Value::String(at.to_rfc3339())))
            }
            Predicate::And(parts) => {
                if parts.is_empty() {
                    return "1=1".to_string();
                }
                parts
                    .iter()
                    .map(|p| format!("({})", self.build(p)))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            }
        }
    }

    fn param(&mut self, field: Field, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}{}", self.param_index, field.cast())
    }
}

pub fn quote(field: Field) -> String {
    format!("\"{}\"", field.column())
}

fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
