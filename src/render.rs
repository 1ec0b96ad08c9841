//! Template renderer: rewrites `[...]` expressions embedded inside JSON
//! string literals in the raw template *text*, then re-parses the result
//! as JSON. Working on text rather than a parsed tree is what lets a
//! whole-value substitution splice in a typed result (a number, bool, or
//! object) instead of always producing a quoted string.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::expr::evaluate_str;
use crate::model::{value_display, JsonObject};
use crate::scanner;

/// Rewrites every `[...]` expression found inside top-level JSON string
/// literals in `text`, then parses the rewritten text as JSON.
pub fn render_template_text(text: &str, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<Value> {
    let rewritten = rewrite_text(text, template, parameters, depth)?;
    serde_json::from_str(&rewritten).map_err(|e| Error::Parse(format!("failed to parse rendered template: {e}")))
}

fn rewrite_text(text: &str, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = String::new();
    let mut current = 0usize;
    loop {
        let string_start = match text[current..].find('"') {
            Some(offset) => current + offset,
            None => break,
        };
        let string_end = match scanner::find(b'"', bytes, string_start + 1) {
            Ok(end) => end,
            // An unterminated string literal is tolerated: not our problem,
            // leave the remainder of the text untouched.
            Err(_) => break,
        };
        let string_content = &text[string_start..=string_end];
        out.push_str(&text[current..string_start]);
        if string_content.contains('[') {
            out.push_str(&rewrite_string_literal(string_content, template, parameters, depth)?);
        } else {
            out.push_str(string_content);
        }
        current = string_end + 1;
    }
    out.push_str(&text[current..]);
    Ok(out)
}

/// `content` is a whole JSON string literal, quotes included.
fn rewrite_string_literal(content: &str, template: &JsonObject, parameters: &JsonObject, depth: usize) -> Result<String> {
    let bytes = content.as_bytes();
    let mut out = String::new();
    let mut current = 0usize;
    loop {
        let bracket_offset = match content[current..].find('[') {
            Some(offset) => current + offset,
            None => break,
        };

        // `[[` is the escape for a literal `[`.
        if bytes.get(bracket_offset + 1) == Some(&b'[') {
            out.push_str(&content[current..bracket_offset]);
            out.push('[');
            current = bracket_offset + 2;
            continue;
        }

        let expression_end = scanner::find_nested(b']', bytes, bracket_offset + 1)?;
        if expression_end >= content.len() {
            // No closing delimiter for the expression — not our problem.
            break;
        }

        let expression = &content[bracket_offset + 1..expression_end];
        let parsed = evaluate_str(expression, template, parameters, depth)?;
        let whole_string_is_the_expression = bracket_offset > 0
            && bytes[bracket_offset - 1] == b'"'
            && bytes.get(expression_end + 1) == Some(&b'"');

        if !whole_string_is_the_expression {
            out.push_str(&content[current..bracket_offset]);
            out.push_str(&value_display(&parsed));
            current = expression_end + 1;
            continue;
        }

        match &parsed {
            Value::Bool(_) | Value::Number(_) => {
                out.push_str(&content[current..bracket_offset - 1]);
                out.push_str(&value_display(&parsed));
                current = expression_end + 2;
            }
            Value::Object(_) => {
                let json_content = serde_json::to_string(&parsed).map_err(|e| Error::Parse(e.to_string()))?;
                out.push_str(&content[current..bracket_offset - 1]);
                out.push_str(&json_content);
                current = expression_end + 2;
            }
            _ => {
                out.push_str(&content[current..bracket_offset]);
                out.push_str(&value_display(&parsed));
                current = expression_end + 1;
            }
        }
    }
    out.push_str(&content[current..]);
    Ok(out)
}
