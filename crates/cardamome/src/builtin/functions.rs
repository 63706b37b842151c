//! Expression functions

use crate::action::Library;
use crate::convert::TargetType;
use crate::error::{ExpressionError, Result};
use crate::value::Value;

pub(super) fn register(library: Library) -> Library {
    library
        .function("eq", vec![TargetType::Any, TargetType::Any], |args| {
            Ok(Value::Bool(loosely_equal(&args[0], &args[1])))
        })
        .function("not", vec![TargetType::Any], |args| {
            Ok(Value::Bool(!args[0].is_truthy()))
        })
        .function("length", vec![TargetType::Any], length)
        .function("upper", vec![TargetType::STRING], |args| {
            Ok(Value::String(args[0].render_to_string().to_uppercase()))
        })
        .function("lower", vec![TargetType::STRING], |args| {
            Ok(Value::String(args[0].render_to_string().to_lowercase()))
        })
        .function("default", vec![TargetType::Any, TargetType::Any], |args| {
            let value = &args[0];
            let missing = value.is_null() || value.as_str().is_some_and(str::is_empty);
            Ok(if missing { args[1].clone() } else { value.clone() })
        })
        .variadic_function("concat", vec![], TargetType::Any, |args| {
            Ok(Value::String(args.iter().map(Value::render_to_string).collect()))
        })
}

/// Integers compare by value whatever their width
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn length(args: &[Value]) -> Result<Value> {
    let len = match &args[0] {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::List(items) | Value::Array(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(ExpressionError::Function {
                function: "length".to_string(),
                message: format!("`{}` has no length", other.type_key()),
            }
            .into());
        }
    };
    Ok(Value::U64(len as u64))
}
