//! Parameter coercion and bounds checking. Values can arrive as any JSON
//! type (a parameters file, a default, or raw prompt input as a string);
//! each `validate_*` function both coerces to the declared type and
//! enforces its bounds in one pass.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{value_display, ParameterDefinition, ParameterType};

/// Coerces `value` to an `i64`, requiring that the parse round-trip
/// exactly: `"007"`, `"1.0"` and `" 1"` are all rejected because
/// re-stringifying the parsed integer doesn't reproduce the input
/// (leading zeros, a decimal point, or stray whitespace all changed it).
pub fn validate_int(value: &Value, min: Option<i64>, max: Option<i64>) -> Result<i64> {
    let original = value_display(value);
    let parsed: i64 = original
        .parse()
        .map_err(|_| Error::Validation(format!("value '{original}' is not a valid integer")))?;
    if parsed.to_string() != original {
        return Err(Error::Validation(format!("value '{original}' is not a valid integer")));
    }
    if let Some(min) = min {
        if parsed < min {
            return Err(Error::Validation(format!("minimum value: {min}")));
        }
    }
    if let Some(max) = max {
        if parsed > max {
            return Err(Error::Validation(format!("maximum value: {max}")));
        }
    }
    Ok(parsed)
}

/// Coerces `value` to a non-empty string within the declared length bounds.
/// Non-string JSON values are stringified rather than rejected, matching
/// the permissive behavior of the original validator.
pub fn validate_string(value: &Value, min_length: Option<usize>, max_length: Option<usize>) -> Result<String> {
    let s = value_display(value);
    if s.is_empty() {
        return Err(Error::Validation("value must not be empty".into()));
    }
    if let Some(min) = min_length {
        if s.len() < min {
            return Err(Error::Validation(format!("minimum length: {min}")));
        }
    }
    if let Some(max) = max_length {
        if s.len() > max {
            return Err(Error::Validation(format!("maximum length: {max}")));
        }
    }
    Ok(s)
}

/// Accepts a native JSON bool, or a case-insensitive `"true"`/`"false"` string.
pub fn validate_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::Validation(format!(
            "value '{}' is not a valid boolean",
            value_display(value)
        ))),
    }
}

/// Full parameter validation: type coercion, bounds, and (if declared)
/// membership in `allowedValues`, checked by exact value equality against
/// the already-coerced value.
pub fn validate_parameter(name: &str, def: &ParameterDefinition, value: &Value) -> Result<Value> {
    let coerced = match def.param_type {
        ParameterType::Int => validate_int(value, def.min_value, def.max_value)
            .map(Value::from)
            .map_err(|_| {
                Error::Validation(format!(
                    "the value '{}' of parameter '{name}' is not an int",
                    value_display(value)
                ))
            })?,
        ParameterType::Bool => validate_bool(value).map(Value::Bool).map_err(|_| {
            Error::Validation(format!(
                "the value '{}' of parameter '{name}' is not a bool",
                value_display(value)
            ))
        })?,
        ParameterType::String => validate_string(value, def.min_length, def.max_length)
            .map(Value::String)
            .map_err(|e| {
                Error::Validation(format!(
                    "the value '{}' of parameter '{name}' does not meet requirements: {e}",
                    value_display(value)
                ))
            })?,
    };
    if let Some(allowed) = &def.allowed_values {
        if !allowed.contains(&coerced) {
            return Err(Error::Validation(format!(
                "the value supplied for parameter '{name}' is not one of the allowed values"
            )));
        }
    }
    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_accepts_clean_string() {
        assert_eq!(validate_int(&json!("42"), None, None).unwrap(), 42);
    }

    #[test]
    fn int_accepts_native_number() {
        assert_eq!(validate_int(&json!(42), None, None).unwrap(), 42);
    }

    #[test]
    fn int_rejects_leading_zero() {
        assert!(validate_int(&json!("007"), None, None).is_err());
    }

    #[test]
    fn int_rejects_decimal() {
        assert!(validate_int(&json!("1.0"), None, None).is_err());
    }

    #[test]
    fn int_rejects_whitespace() {
        assert!(validate_int(&json!(" 1"), None, None).is_err());
    }

    #[test]
    fn int_enforces_bounds() {
        assert!(validate_int(&json!(5), Some(10), None).is_err());
        assert!(validate_int(&json!(15), None, Some(10)).is_err());
        assert!(validate_int(&json!(10), Some(0), Some(10)).is_ok());
    }

    #[test]
    fn string_rejects_empty() {
        assert!(validate_string(&json!(""), None, None).is_err());
        assert!(validate_string(&json!(null), None, None).is_err());
    }

    #[test]
    fn string_enforces_length() {
        assert!(validate_string(&json!("ab"), Some(3), None).is_err());
        assert!(validate_string(&json!("abcd"), None, Some(3)).is_err());
    }

    #[test]
    fn bool_accepts_case_insensitive_string() {
        assert!(validate_bool(&json!("TRUE")).unwrap());
        assert!(!validate_bool(&json!("False")).unwrap());
    }

    #[test]
    fn bool_rejects_other_strings() {
        assert!(validate_bool(&json!("yes")).is_err());
    }

    #[test]
    fn allowed_values_enforced() {
        let def = ParameterDefinition {
            param_type: ParameterType::String,
            default_value: None,
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            allowed_values: Some(vec![json!("a"), json!("b")]),
        };
        assert!(validate_parameter("p", &def, &json!("a")).is_ok());
        assert!(validate_parameter("p", &def, &json!("c")).is_err());
    }
}
