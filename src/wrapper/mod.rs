//! Command-line wrapping: turns package references into an OS-specific
//! install command, wraps a task's command line to upload declared
//! `outputFiles` on completion, and folds the resulting fragments into a
//! pool's start task.

pub mod outputfiles;
pub mod packages;
pub mod setup;

/// POSIX shell escaping equivalent to Python's `shlex.quote`: text made up
/// entirely of characters safe to leave unquoted passes through unchanged;
/// anything else is wrapped in single quotes, with embedded single quotes
/// escaped as `'\''`.
pub fn shell_escape(s: &str) -> String {
    let is_safe_unquoted =
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "@%_-+=:,./".contains(c));
    if is_safe_unquoted {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_text_is_left_unquoted() {
        assert_eq!(shell_escape("simple-command_line.py"), "simple-command_line.py");
    }

    #[test]
    fn unsafe_text_is_quoted() {
        assert_eq!(shell_escape("echo hi"), "'echo hi'");
    }

    #[test]
    fn embedded_quote_is_escaped() {
        assert_eq!(shell_escape("it's"), r#"'it'"'"'s'"#);
    }
}
