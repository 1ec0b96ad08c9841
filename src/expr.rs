//! ARM-style expression evaluator: `parameters('x')`, `variables('y')`,
//! `concat(a, b, ...)`, string literals, and bracket/paren unwrapping.
//! Operates on raw substrings the renderer has already located — it does
//! not re-scan JSON text itself, only the already-delimited expression body.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{unwrap_value_form, value_display, JsonObject, ParameterDefinition};
use crate::{params, scanner};

const MAX_RECURSION_DEPTH: usize = 32;

fn depth_check(depth: usize) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::Validation(
            "template expression recursion limit exceeded".into(),
        ));
    }
    Ok(())
}

/// Evaluates a raw JSON value found as a `variables` definition: non-string
/// values pass through unevaluated (only string bodies carry expression
/// syntax), mirroring the original's "not a string, return as-is" guard.
fn evaluate_value(value: &Value, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<Value> {
    match value {
        Value::String(s) => evaluate_str(s, template, parameters, depth),
        other => Ok(other.clone()),
    }
}

/// Evaluates an expression body (the text between a template's `[...]`
/// delimiters, with those delimiters already stripped by the caller, or a
/// recursive sub-expression).
pub fn evaluate_str(expression: &str, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<Value> {
    depth_check(depth)?;
    if expression.is_empty() {
        return Ok(Value::String(String::new()));
    }
    let bytes = expression.as_bytes();
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];

    if bytes.len() >= 2 && first == b'[' && last == b']' {
        return evaluate_str(&expression[1..expression.len() - 1], template, parameters, depth + 1);
    }
    if bytes.len() >= 2 && first == b'(' && last == b')' {
        return evaluate_str(&expression[1..expression.len() - 1], template, parameters, depth + 1);
    }
    if bytes.len() >= 2 && first == b'\'' && last == b'\'' {
        return Ok(Value::String(expression[1..expression.len() - 1].to_string()));
    }
    if let Some(name) = extract_quoted_call(expression, "parameters") {
        return eval_parameter(name, template, parameters, depth);
    }
    if let Some(name) = extract_quoted_call(expression, "variables") {
        return eval_variable(name, template, parameters, depth);
    }
    if let Some(args) = expression.strip_prefix("concat(").and_then(|s| s.strip_suffix(')')) {
        return eval_concat(args, template, parameters, depth);
    }
    if expression.starts_with("reference") {
        return Err(Error::Unsupported(
            "the ARM-style 'reference' expression is not supported".into(),
        ));
    }
    Ok(Value::String(expression.to_string()))
}

/// Matches `func('name')` and returns `name`, mirroring the original's
/// fixed-offset slice of `func('` / `')` — callers must spell the call
/// exactly this way (single-quoted, no surrounding whitespace).
fn extract_quoted_call<'a>(expression: &'a str, func: &str) -> Option<&'a str> {
    let prefix = format!("{func}('");
    let suffix = "')";
    if expression.len() >= prefix.len() + suffix.len()
        && expression.starts_with(&prefix)
        && expression.ends_with(suffix)
    {
        Some(&expression[prefix.len()..expression.len() - suffix.len()])
    } else {
        None
    }
}

fn eval_parameter(name: &str, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<Value> {
    let param_defs = template
        .get("parameters")
        .and_then(|v| v.as_object())
        .ok_or_else(|| Error::Validation(format!("template defines no parameters, but '{name}' was referenced")))?;
    let def_value = param_defs
        .get(name)
        .ok_or_else(|| Error::Validation(format!("template does not define parameter '{name}'")))?;
    let def: ParameterDefinition = serde_json::from_value(def_value.clone())
        .map_err(|e| Error::Validation(format!("parameter '{name}' definition is invalid: {e}")))?;

    let user_value = parameters
        .get(name)
        .map(unwrap_value_form)
        .or_else(|| def.default_value.clone())
        .ok_or_else(|| Error::Validation(format!("no value supplied for parameter '{name}' and no default value")))?;

    if let Value::Object(obj) = &user_value {
        let text = serde_json::to_string(&Value::Object(obj.clone())).map_err(|e| Error::Parse(e.to_string()))?;
        return crate::render::render_template_text(&text, template, parameters, depth + 1);
    }
    params::validate_parameter(name, &def, &user_value)
}

fn eval_variable(name: &str, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<Value> {
    let raw_value = template
        .get("variables")
        .and_then(|v| v.as_object())
        .and_then(|vars| vars.get(name))
        .ok_or_else(|| Error::Validation(format!("template contains no definition for variable '{name}'")))?;

    let evaluated = evaluate_value(raw_value, template, parameters, depth + 1)?;
    if let Value::Object(obj) = &evaluated {
        let text = serde_json::to_string(&Value::Object(obj.clone())).map_err(|e| Error::Parse(e.to_string()))?;
        return crate::render::render_template_text(&text, template, parameters, depth + 1);
    }
    Ok(evaluated)
}

fn eval_concat(args: &str, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<Value> {
    let bytes = args.as_bytes();
    let mut content = String::new();
    let mut index = 0usize;
    while index < args.len() {
        let end = scanner::find_nested(b',', bytes, index)?;
        let argument = args[index..end].trim();
        let evaluated = evaluate_str(argument, template, parameters, depth + 1)?;
        content.push_str(&value_display(&evaluated));
        index = end + 1;
    }
    Ok(Value::String(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(parameters: Value, variables: Value) -> JsonObject {
        let mut t = JsonObject::new();
        t.insert("parameters".into(), parameters);
        t.insert("variables".into(), variables);
        t
    }

    #[test]
    fn string_literal_unwraps_quotes() {
        let t = template(json!({}), json!({}));
        let p = JsonObject::new();
        assert_eq!(
            evaluate_str("'hello'", &t, &p, 0).unwrap(),
            Value::String("hello".into())
        );
    }

    #[test]
    fn parameter_lookup_uses_default_when_unsupplied() {
        let t = template(json!({"name": {"type": "string", "defaultValue": "fallback"}}), json!({}));
        let p = JsonObject::new();
        assert_eq!(
            evaluate_str("parameters('name')", &t, &p, 0).unwrap(),
            Value::String("fallback".into())
        );
    }

    #[test]
    fn parameter_lookup_prefers_supplied_value() {
        let t = template(json!({"count": {"type": "int", "defaultValue": 1}}), json!({}));
        let mut p = JsonObject::new();
        p.insert("count".into(), json!({"value": 7}));
        assert_eq!(evaluate_str("parameters('count')", &t, &p, 0).unwrap(), json!(7));
    }

    #[test]
    fn variable_lookup_evaluates_nested_expression() {
        let t = template(
            json!({"name": {"type": "string", "defaultValue": "world"}}),
            json!({"greeting": "[concat('hello ', parameters('name'))]"}),
        );
        let p = JsonObject::new();
        assert_eq!(
            evaluate_str("variables('greeting')", &t, &p, 0).unwrap(),
            Value::String("hello world".into())
        );
    }

    #[test]
    fn concat_joins_mixed_arguments() {
        let t = template(json!({}), json!({}));
        let p = JsonObject::new();
        let result = evaluate_str("concat('a', 'b', 'c')", &t, &p, 0).unwrap();
        assert_eq!(result, Value::String("abc".into()));
    }

    #[test]
    fn reference_expression_is_unsupported() {
        let t = template(json!({}), json!({}));
        let p = JsonObject::new();
        let err = evaluate_str("reference('x')", &t, &p, 0).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn recursion_guard_trips_on_self_referential_variable() {
        let t = template(json!({}), json!({"loop": "[variables('loop')]"}));
        let p = JsonObject::new();
        let err = evaluate_str("variables('loop')", &t, &p, 0).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
