//! Placeholder substitution for task factories: sweep index patterns
//! (`{n}`, `{n:m}`) and per-file tokens (`{url}`, `{filePath}`, ...).
//! Both go through the same brace-escape pass first, so `{{`/`}}` always
//! mean a literal `{`/`}` regardless of which substitutor runs.

use regex::{Captures, Regex};

use crate::error::{Error, Result};
use crate::model::ResolvedFile;

const LEFT_SENTINEL: char = '\u{E800}';
const RIGHT_SENTINEL: char = '\u{E801}';

/// Escapes `{{`/`}}` to sentinel characters, runs `transform` over the
/// result, then restores the sentinels to literal `{`/`}`. Any unescaped
/// `{`/`}` left after the transform is an error — it means the source had
/// a placeholder-shaped token that didn't resolve to anything, most likely
/// a typo the caller needs to either fix or escape.
pub fn substitute<F>(source: &str, transform: F) -> Result<String>
where
    F: FnOnce(&str) -> Result<String>,
{
    let escaped = escape_braces(source);
    let transformed = transform(&escaped)?;
    if transformed.contains('{') || transformed.contains('}') {
        return Err(Error::Validation(
            "invalid use of bracket characters, did you forget to escape (using {{ }})?".into(),
        ));
    }
    Ok(transformed.replace(LEFT_SENTINEL, "{").replace(RIGHT_SENTINEL, "}"))
}

fn escape_braces(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' && chars.get(i + 1) == Some(&'{') {
            out.push(LEFT_SENTINEL);
            i += 2;
        } else if chars[i] == '}' && chars.get(i + 1) == Some(&'}') {
            out.push(RIGHT_SENTINEL);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Replaces `{n}`/`{n:m}` with the n-th sweep parameter, zero-padded to
/// width `m` (1-9) in the `{n:m}` form. `n` out of bounds, a negative
/// value paired with padding, or a padding width outside 1-9 are errors.
pub fn sweep_transform(content: &str, parameters: &[i64]) -> Result<String> {
    let pattern = Regex::new(r"\{(\d+)(:(\d+))?\}").expect("static pattern is valid");
    let mut error: Option<Error> = None;

    let replaced = pattern
        .replace_all(content, |caps: &Captures| {
            if error.is_some() {
                return String::new();
            }
            let whole = caps.get(0).unwrap().as_str();
            let index: usize = caps[1].parse().expect("\\d+ capture is numeric");
            if index >= parameters.len() {
                error = Some(Error::Validation(format!("the parameter pattern '{whole}' is out of bound")));
                return String::new();
            }
            let value = parameters[index];
            match caps.get(3) {
                Some(pad) => {
                    if value < 0 {
                        error = Some(Error::Validation(format!(
                            "the parameter '{value}' is negative and cannot be used in pattern '{whole}'"
                        )));
                        return String::new();
                    }
                    let width: usize = pad.as_str().parse().expect("\\d+ capture is numeric");
                    if !(1..=9).contains(&width) {
                        error = Some(Error::Validation(format!(
                            "the parameter pattern '{whole}' is out of bound, padding width must be between 1 and 9"
                        )));
                        return String::new();
                    }
                    format!("{value:0width$}")
                }
                None => value.to_string(),
            }
        })
        .into_owned();

    if let Some(e) = error {
        return Err(e);
    }
    Ok(replaced)
}

/// Replaces `{url}`, `{filePath}`, `{fileName}`, `{fileNameWithoutExtension}`
/// with the matching field from `file_ref`.
pub fn file_transform(content: &str, file_ref: &ResolvedFile) -> Result<String> {
    let mut out = content.to_string();
    out = out.replace("{url}", &file_ref.url);
    out = out.replace("{filePath}", &file_ref.file_path);
    out = out.replace("{fileName}", &file_ref.file_name);
    out = out.replace("{fileNameWithoutExtension}", &file_ref.file_name_without_extension);
    Ok(out)
}
