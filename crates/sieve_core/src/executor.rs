//! Folds loaded content through the steps of a group.
//!
//! | kind      | applies to       | otherwise                  |
//! |-----------|------------------|----------------------------|
//! | `filter`  | arrays           | step skipped               |
//! | `map`     | arrays           | step skipped               |
//! | `flatmap` | arrays           | step skipped               |
//! | `select`  | objects, arrays  | whole run halts            |

use rhai::{Dynamic, EvalAltResult, AST};
use serde_json::Value;
use sieve_logging::{sieve_debug, sieve_trace};

use crate::script::{from_script_value, to_script_value, ScriptEngine};
use crate::{Filter, StepKind, StepRuntimeError};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every step ran (or was skipped); this is the value to display.
    Completed(Value),
    /// A `select` step met a value it cannot index. Nothing is displayed
    /// for this run.
    Halted { position: usize },
}

/// Runs `steps` left to right over `content`. Deterministic for
/// deterministic step bodies; the first step that raises aborts the run.
pub fn run(
    scripts: &ScriptEngine,
    content: &Value,
    steps: &[Filter],
) -> Result<RunOutcome, StepRuntimeError> {
    let mut data = content.clone();
    for (position, step) in steps.iter().enumerate() {
        let Some(ast) = step.transform.compiled() else {
            sieve_debug!("skipping step {} at {position}: body does not compile", step.id);
            continue;
        };
        let fail = |err: Box<EvalAltResult>| StepRuntimeError {
            position,
            kind: step.kind,
            message: err.to_string(),
        };
        sieve_trace!("running {} step {} at {position}", step.kind, step.id);

        data = match (step.kind, data) {
            (StepKind::Filter, Value::Array(items)) => {
                Value::Array(keep_truthy(scripts, ast, items).map_err(fail)?)
            }
            (StepKind::Map, Value::Array(items)) => {
                Value::Array(map_items(scripts, ast, &items).map_err(fail)?)
            }
            (StepKind::FlatMap, Value::Array(items)) => {
                Value::Array(flat_map_items(scripts, ast, &items).map_err(fail)?)
            }
            (StepKind::Select, target @ (Value::Object(_) | Value::Array(_))) => {
                let key = scripts.call_accessor(ast).map_err(fail)?;
                index_into(target, &key)
            }
            (StepKind::Select, _) => return Ok(RunOutcome::Halted { position }),
            (_, unchanged) => unchanged,
        };
    }
    Ok(RunOutcome::Completed(data))
}

fn call_each(
    scripts: &ScriptEngine,
    ast: &AST,
    items: &[Value],
) -> Result<Vec<Dynamic>, Box<EvalAltResult>> {
    let list = to_script_value(items)?.into_shared();
    items
        .iter()
        .enumerate()
        .map(|(index, item)| scripts.call_element(ast, to_script_value(item)?, index, &list))
        .collect()
}

fn keep_truthy(
    scripts: &ScriptEngine,
    ast: &AST,
    items: Vec<Value>,
) -> Result<Vec<Value>, Box<EvalAltResult>> {
    let verdicts = call_each(scripts, ast, &items)?;
    Ok(items
        .into_iter()
        .zip(verdicts)
        .filter_map(|(item, verdict)| is_truthy(&verdict).then_some(item))
        .collect())
}

fn map_items(
    scripts: &ScriptEngine,
    ast: &AST,
    items: &[Value],
) -> Result<Vec<Value>, Box<EvalAltResult>> {
    call_each(scripts, ast, items)?
        .iter()
        .map(from_script_value)
        .collect()
}

fn flat_map_items(
    scripts: &ScriptEngine,
    ast: &AST,
    items: &[Value],
) -> Result<Vec<Value>, Box<EvalAltResult>> {
    let mut flattened = Vec::with_capacity(items.len());
    for value in map_items(scripts, ast, items)? {
        match value {
            Value::Array(inner) => flattened.extend(inner),
            other => flattened.push(other),
        }
    }
    Ok(flattened)
}

/// `false`, unit, zero, NaN and the empty string are falsy.
pub(crate) fn is_truthy(value: &Dynamic) -> bool {
    if let Ok(flag) = value.as_bool() {
        return flag;
    }
    if value.is_unit() {
        return false;
    }
    if let Ok(number) = value.as_int() {
        return number != 0;
    }
    if let Ok(number) = value.as_float() {
        return number != 0.0 && !number.is_nan();
    }
    if value.is_string() {
        return value
            .clone()
            .into_string()
            .map(|text| !text.is_empty())
            .unwrap_or(true);
    }
    true
}

/// Looks `key` up in an object or array. A key that cannot address the
/// target, or is absent from it, yields `null`.
pub(crate) fn index_into(target: Value, key: &Dynamic) -> Value {
    match target {
        Value::Array(mut items) => match array_index(key) {
            Some(index) if index < items.len() => items.swap_remove(index),
            _ => Value::Null,
        },
        Value::Object(mut fields) => property_name(key)
            .and_then(|name| fields.remove(&name))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn array_index(key: &Dynamic) -> Option<usize> {
    if let Ok(number) = key.as_int() {
        return usize::try_from(number).ok();
    }
    if let Ok(number) = key.as_float() {
        return (number >= 0.0 && number.fract() == 0.0).then_some(number as usize);
    }
    if key.is_string() {
        return key.clone().into_string().ok()?.trim().parse().ok();
    }
    None
}

fn property_name(key: &Dynamic) -> Option<String> {
    if key.is_string() {
        return key.clone().into_string().ok();
    }
    if let Ok(ch) = key.as_char() {
        return Some(ch.to_string());
    }
    if let Ok(number) = key.as_int() {
        return Some(number.to_string());
    }
    if let Ok(flag) = key.as_bool() {
        return Some(flag.to_string());
    }
    if let Ok(number) = key.as_float() {
        return Some(number.to_string());
    }
    None
}
