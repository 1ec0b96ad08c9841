//! Wraps a task's `commandLine` so that, on completion, any declared
//! `outputFiles` get uploaded by the bootstrap uploader this crate stages
//! alongside the job (see `egress`). Tasks without `outputFiles` pass
//! through unchanged.

use serde_json::Value;

use super::shell_escape;
use crate::collaborators::Storage;
use crate::error::{Error, Result};
use crate::model::{JsonObject, OsFlavor};

const ENV_NAME: &str = "AZ_BATCH_FILE_UPLOAD_CONFIG";

/// Validates and wraps a task's `outputFiles`, or returns the task
/// unchanged if it declares none.
pub fn wrap_task_output_files(task: &JsonObject, os: OsFlavor, storage: &dyn Storage) -> Result<JsonObject> {
    let output_files = match task.get("outputFiles").and_then(|v| v.as_array()) {
        Some(v) => v.clone(),
        None => return Ok(task.clone()),
    };

    let mut new_task = task.clone();
    new_task.remove("outputFiles");

    let mut validated_outputs = Vec::with_capacity(output_files.len());
    for entry in &output_files {
        validated_outputs.push(Value::Object(validate_output_file(entry, storage)?));
    }

    let command_line = new_task
        .get("commandLine")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation("task must have a commandLine to wrap outputFiles around".into()))?
        .to_string();

    let wrapped = match os {
        OsFlavor::Windows => format!(
            "cmd /c \"{command_line} & %AZ_BATCH_JOB_PREP_WORKING_DIR%\\uploadfiles.py %errorlevel%\""
        ),
        OsFlavor::Linux => {
            let inner = format!("{command_line};err=$?;$AZ_BATCH_JOB_PREP_WORKING_DIR/uploadfiles.py $err;exit $err");
            format!("/bin/bash -c {}", shell_escape(&inner))
        }
    };
    new_task.insert("commandLine".into(), Value::String(wrapped));

    let mut config = JsonObject::new();
    config.insert("outputFiles".into(), Value::Array(validated_outputs));
    let config_text =
        serde_json::to_string(&Value::Object(config)).map_err(|e| Error::Parse(e.to_string()))?;

    let mut envs = match new_task.remove("environmentSettings") {
        Some(Value::Array(a)) => a,
        _ => Vec::new(),
    };
    let mut entry = JsonObject::new();
    entry.insert("name".into(), Value::String(ENV_NAME.to_string()));
    entry.insert("value".into(), Value::String(config_text));
    envs.push(Value::Object(entry));
    new_task.insert("environmentSettings".into(), Value::Array(envs));

    Ok(new_task)
}

fn validate_output_file(entry: &Value, storage: &dyn Storage) -> Result<JsonObject> {
    let mut obj = entry
        .as_object()
        .cloned()
        .ok_or_else(|| Error::Validation("an outputFile entry must be an object".into()))?;

    for prop in ["filePattern", "destination", "uploadDetails"] {
        if !obj.contains_key(prop) {
            return Err(Error::Validation(format!("an outputFile entry must include '{prop}'")));
        }
    }

    {
        let dest = obj
            .get_mut("destination")
            .and_then(|v| v.as_object_mut())
            .ok_or_else(|| Error::Validation("outputFile.destination must be an object".into()))?;
        let has_container = dest.contains_key("container");
        let has_auto = dest.contains_key("autoStorage");
        if !has_container && !has_auto {
            return Err(Error::Validation(
                "outputFile.destination must include a 'container' or 'autoStorage' property".into(),
            ));
        }
        if has_container && has_auto {
            return Err(Error::Validation(
                "outputFile.destination cannot have both 'container' and 'autoStorage' properties".into(),
            ));
        }
        if has_auto {
            let auto = dest.remove("autoStorage").unwrap();
            let auto_obj = auto
                .as_object()
                .ok_or_else(|| Error::Validation("outputFile.destination.autoStorage must be an object".into()))?;
            let file_group = auto_obj
                .get("fileGroup")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::Validation("outputFile.destination.autoStorage must have 'fileGroup'".into()))?;
            let sas = storage.get_container_sas(file_group)?;
            let mut container = JsonObject::new();
            container.insert("containerSas".into(), Value::String(sas));
            if let Some(path) = auto_obj.get("path") {
                container.insert("path".into(), path.clone());
            }
            dest.insert("container".into(), Value::Object(container));
        }
    }

    let task_status_present = obj
        .get("uploadDetails")
        .and_then(|v| v.get("taskStatus"))
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    if !task_status_present {
        return Err(Error::Validation("outputFile.uploadDetails must include 'taskStatus'".into()));
    }

    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResolvedFile;
    use serde_json::json;

    struct FakeStorage;

    impl Storage for FakeStorage {
        fn resolve_resource_file(&self, _entry: &JsonObject) -> Result<Vec<JsonObject>> {
            unreachable!()
        }
        fn get_container_sas(&self, file_group: &str) -> Result<String> {
            Ok(format!("https://sas/{file_group}"))
        }
        fn get_container_list(&self, _source: &Value) -> Result<Vec<ResolvedFile>> {
            unreachable!()
        }
    }

    fn task_with_outputs() -> JsonObject {
        json!({
            "id": "t1",
            "commandLine": "run.sh",
            "outputFiles": [{
                "filePattern": "*.log",
                "destination": {"autoStorage": {"fileGroup": "logs"}},
                "uploadDetails": {"taskStatus": "TaskCompletion"}
            }]
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn linux_wraps_with_shell_escape_and_trap() {
        let wrapped = wrap_task_output_files(&task_with_outputs(), OsFlavor::Linux, &FakeStorage).unwrap();
        let cmd = wrapped["commandLine"].as_str().unwrap();
        assert!(cmd.starts_with("/bin/bash -c"));
        assert!(cmd.contains("run.sh"));
        assert!(cmd.contains("uploadfiles.py"));
    }

    #[test]
    fn windows_wraps_with_cmd() {
        let wrapped = wrap_task_output_files(&task_with_outputs(), OsFlavor::Windows, &FakeStorage).unwrap();
        let cmd = wrapped["commandLine"].as_str().unwrap();
        assert!(cmd.starts_with("cmd /c \""));
        assert!(cmd.contains("%errorlevel%"));
    }

    #[test]
    fn auto_storage_resolves_to_container_sas() {
        let wrapped = wrap_task_output_files(&task_with_outputs(), OsFlavor::Linux, &FakeStorage).unwrap();
        let env = wrapped["environmentSettings"].as_array().unwrap();
        let config: Value = serde_json::from_str(env[0]["value"].as_str().unwrap()).unwrap();
        let dest = &config["outputFiles"][0]["destination"];
        assert_eq!(dest["container"]["containerSas"], json!("https://sas/logs"));
        assert!(dest.get("autoStorage").is_none());
    }

    #[test]
    fn task_without_output_files_passes_through() {
        let mut task = JsonObject::new();
        task.insert("id".into(), json!("t1"));
        let result = wrap_task_output_files(&task, OsFlavor::Linux, &FakeStorage).unwrap();
        assert_eq!(result, task);
    }

    #[test]
    fn missing_task_status_is_rejected() {
        let mut task = task_with_outputs();
        let outputs = task.get_mut("outputFiles").unwrap().as_array_mut().unwrap();
        outputs[0].as_object_mut().unwrap().insert("uploadDetails".into(), json!({}));
        assert!(wrap_task_output_files(&task, OsFlavor::Linux, &FakeStorage).is_err());
    }
}
