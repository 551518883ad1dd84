//! Partial deep-equality matching
//!
//! Every field present in the expected pattern must match the actual value;
//! fields absent from the pattern are ignored. Arrays match when each
//! expected element matches at least one actual element. The first
//! divergence is reported with its path.

use std::fmt;

use serde_json::Value;

/// First point where the actual value diverges from the pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Path of the divergence, e.g. `response.body.data[0].first_name`
    pub path: String,
    pub expected: Value,
    /// `None` when the field is absent
    pub actual: Option<Value>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        match &self.actual {
            Some(actual) => write!(
                f,
                "at '{}': expected {}, got {}",
                path, self.expected, actual
            ),
            None => write!(f, "at '{}': expected {}, field missing", path, self.expected),
        }
    }
}

/// Match `actual` against a partial `expected` pattern
pub fn match_partial(expected: &Value, actual: &Value) -> Result<(), Mismatch> {
    walk(expected, actual, String::new())
}

fn walk(expected: &Value, actual: &Value, path: String) -> Result<(), Mismatch> {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_value) in exp {
                let child = join_field(&path, key);
                match act.get(key) {
                    Some(act_value) => walk(exp_value, act_value, child)?,
                    None => {
                        return Err(Mismatch {
                            path: child,
                            expected: exp_value.clone(),
                            actual: None,
                        })
                    }
                }
            }
            Ok(())
        }
        (Value::Array(exp), Value::Array(act)) => {
            for (i, exp_item) in exp.iter().enumerate() {
                let child = format!("{}[{}]", path, i);
                // Prefer the positional element so the reported path is useful
                // when nothing matches.
                let positional = act.get(i);
                if let Some(item) = positional {
                    if walk(exp_item, item, child.clone()).is_ok() {
                        continue;
                    }
                }
                let found = act
                    .iter()
                    .any(|item| walk(exp_item, item, child.clone()).is_ok());
                if !found {
                    return Err(match positional {
                        Some(item) => walk(exp_item, item, child.clone())
                            .err()
                            .unwrap_or_else(|| mismatch(child, exp_item, item)),
                        None => Mismatch {
                            path: child,
                            expected: exp_item.clone(),
                            actual: None,
                        },
                    });
                }
            }
            Ok(())
        }
        (Value::Number(exp), Value::Number(act)) => {
            let equal = match (exp.as_i64(), act.as_i64()) {
                (Some(a), Some(b)) => a == b,
                _ => exp.as_f64() == act.as_f64(),
            };
            if equal {
                Ok(())
            } else {
                Err(mismatch(path, expected, actual))
            }
        }
        _ if expected == actual => Ok(()),
        _ => Err(mismatch(path, expected, actual)),
    }
}

fn mismatch(path: String, expected: &Value, actual: &Value) -> Mismatch {
    Mismatch {
        path,
        expected: expected.clone(),
        actual: Some(actual.clone()),
    }
}

fn join_field(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}
