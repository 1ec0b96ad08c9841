//! Application-template merging: renders a separately-stored job template
//! against caller-supplied parameters, then splices the result onto a job
//! document, enforcing the disjoint property-set rules from spec.md §3.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::collaborators::FileSource;
use crate::error::{Error, Result};
use crate::model::{
    value_display, JsonObject, PROPS_PERMITTED_ON_TEMPLATES_EXTRA, PROPS_RESERVED_FOR_JOBS,
    PROPS_RESERVED_FOR_TEMPLATES,
};
use crate::render;

/// Merges the application template referenced by `job.applicationTemplateInfo`
/// into `job` in place. A no-op if the job has no such reference.
pub fn expand(job: &mut JsonObject, working_dir: &Path, fs: &dyn FileSource) -> Result<()> {
    let info = match job.get("applicationTemplateInfo") {
        Some(Value::Object(o)) => o.clone(),
        _ => return Ok(()),
    };

    let file_path = info.get("filePath").and_then(|v| v.as_str()).ok_or_else(|| {
        Error::Validation(
            "no filePath specified for the requested application template (define applicationTemplateInfo.filePath and try again)".into(),
        )
    })?;
    let resolved_path = normalize_path(&working_dir.join(file_path));

    let template_text = fs
        .read_file(&resolved_path)
        .map_err(|e| Error::Validation(format!("unable to read the template '{}': {e}", resolved_path.display())))?;

    let reserved: Vec<&str> = PROPS_RESERVED_FOR_TEMPLATES
        .iter()
        .filter(|k| job.contains_key(**k))
        .copied()
        .collect();
    if !reserved.is_empty() {
        return Err(Error::Validation(format!(
            "jobs using application templates may not use these properties: {}",
            reserved.join(", ")
        )));
    }

    let template_value: Value = serde_json::from_str(&template_text)
        .map_err(|e| Error::Validation(format!("failed to parse JSON loaded from '{}': {e}", resolved_path.display())))?;
    let template_obj = template_value
        .as_object()
        .ok_or_else(|| Error::Validation("application template must be a JSON object".into()))?;

    validate_application_template(template_obj)?;

    let caller_parameters = info
        .get("parameters")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();
    validate_parameter_usage(&caller_parameters, template_obj.get("parameters").and_then(|v| v.as_object()))?;

    let rendered = render::render_template_text(&template_text, template_obj, &caller_parameters, 0)?;
    let mut job_from_template = rendered
        .as_object()
        .cloned()
        .ok_or_else(|| Error::Validation("application template did not render to a JSON object".into()))?;

    let mut metadata = merge_metadata(
        job_from_template.get("metadata").and_then(|v| v.as_array()),
        job.get("metadata").and_then(|v| v.as_array()),
    )?;
    validate_metadata(&metadata)?;
    metadata.push(make_metadata_entry("az_batch:template_filepath", &resolved_path.display().to_string()));

    validate_generated_job(&job_from_template)?;

    for (key, value) in job_from_template.drain() {
        job.insert(key, value);
    }
    job.remove("applicationTemplateInfo");
    job.remove("templateMetadata");
    job.remove("parameters");
    job.insert("metadata".into(), Value::Array(metadata));

    Ok(())
}

fn permitted_on_templates() -> Vec<&'static str> {
    PROPS_RESERVED_FOR_TEMPLATES
        .iter()
        .chain(PROPS_PERMITTED_ON_TEMPLATES_EXTRA.iter())
        .copied()
        .collect()
}

fn validate_application_template(template: &JsonObject) -> Result<()> {
    let reserved: Vec<&str> = PROPS_RESERVED_FOR_JOBS
        .iter()
        .filter(|k| template.contains_key(**k))
        .copied()
        .collect();
    if !reserved.is_empty() {
        return Err(Error::Validation(format!(
            "application templates may not use these job properties: {}",
            reserved.join(", ")
        )));
    }
    let permitted = permitted_on_templates();
    let unsupported: Vec<String> = template
        .keys()
        .filter(|k| !permitted.contains(&k.as_str()))
        .cloned()
        .collect();
    if !unsupported.is_empty() {
        return Err(Error::Validation(format!(
            "application templates may not use these properties: {}",
            unsupported.join(", ")
        )));
    }
    if let Some(Value::Object(param_defs)) = template.get("parameters") {
        for (name, def) in param_defs {
            match def.get("type").and_then(|v| v.as_str()) {
                Some("int") | Some("string") | Some("bool") => {}
                Some(other) => {
                    return Err(Error::Validation(format!(
                        "the parameter '{name}' specifies an unsupported type: {other}"
                    )))
                }
                None => return Err(Error::Validation(format!("the parameter '{name}' does not specify a type"))),
            }
        }
    }
    Ok(())
}

fn validate_parameter_usage(parameters: &JsonObject, definitions: Option<&JsonObject>) -> Result<()> {
    let definitions = match definitions {
        Some(d) => d,
        None => return Ok(()),
    };
    for (name, def_value) in definitions {
        let default_value = def_value.get("defaultValue").cloned();
        let param = parameters.get(name).cloned().or(default_value);
        let param = match param {
            Some(p) => p,
            None => return Err(Error::Validation(format!("a value for parameter '{name}' must be provided by the job"))),
        };
        match def_value.get("type").and_then(|v| v.as_str()) {
            Some("int") => {
                if crate::params::validate_int(&param, None, None).is_err() {
                    return Err(Error::Validation(format!(
                        "the value '{}' supplied for parameter '{name}' must be an integer",
                        value_display(&param)
                    )));
                }
            }
            Some("bool") => {
                if crate::params::validate_bool(&param).is_err() {
                    return Err(Error::Validation(format!(
                        "the value '{}' supplied for parameter '{name}' must be a boolean",
                        value_display(&param)
                    )));
                }
            }
            _ => {}
        }
    }
    let violations: Vec<&str> = parameters
        .keys()
        .filter(|k| !definitions.contains_key(*k))
        .map(|s| s.as_str())
        .collect();
    if !violations.is_empty() {
        return Err(Error::Validation(format!(
            "provided parameter(s) {} are not expected by the template",
            violations.join(", ")
        )));
    }
    Ok(())
}

fn merge_metadata(base: Option<&Vec<Value>>, more: Option<&Vec<Value>>) -> Result<Vec<Value>> {
    let mut result: Vec<Value> = base.cloned().unwrap_or_default();
    if let Some(more) = more {
        let existing_names: HashSet<&str> = result.iter().filter_map(|m| m.get("name").and_then(|n| n.as_str())).collect();
        let conflicts: Vec<&str> = more
            .iter()
            .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
            .filter(|n| existing_names.contains(n))
            .collect();
        if !conflicts.is_empty() {
            return Err(Error::Validation(format!(
                "may not have multiple definitions for metadata value(s) '{}'",
                conflicts.join(", ")
            )));
        }
        result.extend(more.iter().cloned());
    }
    Ok(result)
}

fn validate_metadata(metadata: &[Value]) -> Result<()> {
    let violations: Vec<&str> = metadata
        .iter()
        .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
        .filter(|n| n.starts_with("az_batch"))
        .collect();
    if !violations.is_empty() {
        return Err(Error::Validation(format!(
            "metadata item(s) '{}' cannot be used; the prefix 'az_batch:' is reserved",
            violations.join(", ")
        )));
    }
    Ok(())
}

fn make_metadata_entry(name: &str, value: &str) -> Value {
    let mut m = JsonObject::new();
    m.insert("name".into(), Value::String(name.to_string()));
    m.insert("value".into(), Value::String(value.to_string()));
    Value::Object(m)
}

fn validate_generated_job(job: &JsonObject) -> Result<()> {
    let reserved: Vec<&str> = PROPS_RESERVED_FOR_JOBS.iter().filter(|k| job.contains_key(**k)).copied().collect();
    if !reserved.is_empty() {
        return Err(Error::Validation(format!(
            "application templates may not specify these properties: {}",
            reserved.join(", ")
        )));
    }
    Ok(())
}

/// Purely lexical `normpath`-equivalent (no symlink resolution, no
/// filesystem access): collapses `.`/`..` segments in a joined path.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                result.pop();
            }
            std::path::Component::CurDir => {}
            other => result.push(other.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeFiles(RefCell<HashMap<String, String>>);

    impl FileSource for FakeFiles {
        fn read_file(&self, path: &Path) -> Result<String> {
            self.0
                .borrow()
                .get(&path.display().to_string())
                .cloned()
                .ok_or_else(|| Error::Validation("file not found".into()))
        }
    }

    #[test]
    fn merges_template_into_job_and_tags_provenance() {
        let mut files = HashMap::new();
        files.insert(
            "/work/template.json".to_string(),
            serde_json::to_string(&json!({
                "parameters": {"name": {"type": "string", "defaultValue": "demo"}},
                "jobManagerTask": {"id": "jm", "commandLine": "[concat('echo ', parameters('name'))]"}
            }))
            .unwrap(),
        );
        let fs = FakeFiles(RefCell::new(files));

        let mut job = JsonObject::new();
        job.insert(
            "applicationTemplateInfo".into(),
            json!({"filePath": "template.json"}),
        );

        expand(&mut job, Path::new("/work"), &fs).unwrap();

        assert_eq!(job["jobManagerTask"]["commandLine"], json!("echo demo"));
        assert!(!job.contains_key("applicationTemplateInfo"));
        let metadata = job["metadata"].as_array().unwrap();
        assert!(metadata
            .iter()
            .any(|m| m["name"] == json!("az_batch:template_filepath")));
    }

    #[test]
    fn rejects_template_using_job_identity_properties() {
        let mut files = HashMap::new();
        files.insert(
            "/work/template.json".to_string(),
            serde_json::to_string(&json!({"id": "not-allowed"})).unwrap(),
        );
        let fs = FakeFiles(RefCell::new(files));

        let mut job = JsonObject::new();
        job.insert("applicationTemplateInfo".into(), json!({"filePath": "template.json"}));

        assert!(expand(&mut job, Path::new("/work"), &fs).is_err());
    }

    #[test]
    fn job_with_no_template_reference_is_untouched() {
        let fs = FakeFiles(RefCell::new(HashMap::new()));
        let mut job = JsonObject::new();
        job.insert("id".into(), json!("plain-job"));
        expand(&mut job, Path::new("/work"), &fs).unwrap();
        assert_eq!(job["id"], json!("plain-job"));
    }
}
