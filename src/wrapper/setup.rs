//! Folds a collection of setup-command fragments (from package-reference
//! installation and/or output-file upload bootstrap) into a pool's start
//! task, preserving any existing start-task command and resource files.

use serde_json::Value;

use super::shell_escape;
use crate::error::{Error, Result};
use crate::model::{JsonObject, OsFlavor, SetupCommandFragment};

/// Builds (or extends) a pool's start task from `fragments`. Returns
/// `existing` unchanged if there are no fragments to add, `None` if there
/// is also no existing start task.
pub fn construct_setup_task(
    existing: Option<&JsonObject>,
    fragments: &[SetupCommandFragment],
    os: OsFlavor,
) -> Result<Option<JsonObject>> {
    if fragments.is_empty() {
        return Ok(existing.cloned());
    }

    let mut commands = Vec::with_capacity(fragments.len());
    let mut resources = Vec::new();
    let mut fragment_os: Option<bool> = None;
    for fragment in fragments {
        commands.push(fragment.cmd_line.clone());
        resources.extend(fragment.resource_files.iter().cloned());
        match fragment_os {
            None => fragment_os = Some(fragment.is_windows),
            Some(w) if w != fragment.is_windows => {
                return Err(Error::Validation(
                    "the generated setup commands are not compatible with a single target OS".into(),
                ))
            }
            _ => {}
        }
    }

    let mut result = existing.cloned().unwrap_or_default();
    if let Some(Value::String(existing_cmd)) = result.get("commandLine") {
        commands.push(existing_cmd.clone());
    }
    if let Some(Value::Array(existing_resources)) = result.get("resourceFiles") {
        resources.extend(existing_resources.iter().cloned());
    }

    let full_command = match os {
        OsFlavor::Windows => format!("cmd.exe /c \"{}\"", commands.join(" & ")),
        OsFlavor::Linux => format!("/bin/bash -c {}", shell_escape(&commands.join(";"))),
    };
    result.insert("commandLine".into(), Value::String(full_command));
    if !resources.is_empty() {
        result.insert("resourceFiles".into(), Value::Array(resources));
    }

    let mut auto_user = JsonObject::new();
    auto_user.insert("elevationLevel".into(), Value::String("admin".into()));
    let mut user_identity = JsonObject::new();
    user_identity.insert("autoUser".into(), Value::Object(auto_user));
    result.insert("userIdentity".into(), Value::Object(user_identity));
    result.insert("waitForSuccess".into(), Value::Bool(true));

    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(cmd: &str, is_windows: bool) -> SetupCommandFragment {
        SetupCommandFragment {
            cmd_line: cmd.to_string(),
            is_windows,
            resource_files: vec![],
        }
    }

    #[test]
    fn no_fragments_returns_existing_unchanged() {
        let existing = JsonObject::new();
        assert_eq!(construct_setup_task(Some(&existing), &[], OsFlavor::Linux).unwrap(), Some(existing));
    }

    #[test]
    fn linux_joins_commands_with_semicolon_and_escapes() {
        let fragments = vec![fragment("apt-get update;apt-get install -y curl", false)];
        let task = construct_setup_task(None, &fragments, OsFlavor::Linux).unwrap().unwrap();
        let cmd = task["commandLine"].as_str().unwrap();
        assert!(cmd.starts_with("/bin/bash -c"));
        assert_eq!(task["waitForSuccess"], serde_json::json!(true));
        assert_eq!(task["userIdentity"]["autoUser"]["elevationLevel"], serde_json::json!("admin"));
    }

    #[test]
    fn existing_command_is_appended_after_new_fragments() {
        let mut existing = JsonObject::new();
        existing.insert("commandLine".into(), serde_json::json!("echo pre-existing"));
        let fragments = vec![fragment("echo new", false)];
        let task = construct_setup_task(Some(&existing), &fragments, OsFlavor::Linux).unwrap().unwrap();
        let cmd = task["commandLine"].as_str().unwrap();
        let new_pos = cmd.find("echo new").unwrap();
        let old_pos = cmd.find("echo pre-existing").unwrap();
        assert!(new_pos < old_pos);
    }

    #[test]
    fn windows_uses_cmd_exe_ampersand_join() {
        let fragments = vec![fragment("choco install 7zip", true)];
        let task = construct_setup_task(None, &fragments, OsFlavor::Windows).unwrap().unwrap();
        assert!(task["commandLine"].as_str().unwrap().starts_with("cmd.exe /c \""));
    }
}
