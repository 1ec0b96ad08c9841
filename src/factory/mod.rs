//! Task-factory expansion: turns a job's `taskFactory` declaration into a
//! concrete task list. Three factory kinds share the repeat-task parsing
//! and placeholder-substitution machinery in this module; each kind's own
//! dispatch logic lives in its submodule.

pub mod collection;
pub mod perfile;
pub mod sweep;

use serde_json::Value;

use crate::collaborators::Storage;
use crate::error::{Error, Result};
use crate::model::{JsonObject, ResolvedFile, PROPS_ON_REPEAT_TASK};
use crate::placeholder;

/// Which placeholder substitution a repeat task is being expanded with.
pub enum SubstitutionContext<'a> {
    Sweep(&'a [i64]),
    File(&'a ResolvedFile),
}

impl<'a> SubstitutionContext<'a> {
    fn transform(&self, content: &str) -> Result<String> {
        match self {
            SubstitutionContext::Sweep(values) => placeholder::sweep_transform(content, values),
            SubstitutionContext::File(file) => placeholder::file_transform(content, file),
        }
    }

    fn apply(&self, content: &str) -> Result<String> {
        placeholder::substitute(content, |escaped| self.transform(escaped))
    }
}

/// Validates and narrows a raw `repeatTask`/`taskFactory.repeatTask` object
/// down to `commandLine` plus the properties a repeat task may carry.
pub fn parse_repeat_task(task: &JsonObject) -> Result<JsonObject> {
    if task.contains_key("id") {
        return Err(Error::Validation("a repeat task object should not have an 'id' specified".into()));
    }
    let command_line = task
        .get("commandLine")
        .cloned()
        .ok_or_else(|| Error::Validation("a repeat task must define 'commandLine'".into()))?;
    let mut new_task = JsonObject::new();
    new_task.insert("commandLine".into(), command_line);
    for prop in PROPS_ON_REPEAT_TASK {
        if let Some(v) = task.get(*prop) {
            new_task.insert((*prop).to_string(), v.clone());
        }
    }
    Ok(new_task)
}

fn transform_field(obj: &mut JsonObject, key: &str, ctx: &SubstitutionContext) -> Result<()> {
    let should_transform = matches!(obj.get(key), Some(Value::String(s)) if !s.is_empty());
    if !should_transform {
        return Ok(());
    }
    if let Some(Value::String(s)) = obj.get(key) {
        let substituted = ctx.apply(s)?;
        obj.insert(key.to_string(), Value::String(substituted));
    }
    Ok(())
}

/// Deep-clones `task`, substitutes placeholders across every field the
/// batch service can round-trip a pattern through, and assigns `id`.
pub fn transform_repeat_task(task: &JsonObject, ctx: &SubstitutionContext, index: usize) -> Result<JsonObject> {
    let mut new_task = task.clone();
    transform_field(&mut new_task, "commandLine", ctx)?;
    transform_field(&mut new_task, "displayName", ctx)?;

    if let Some(Value::Array(resources)) = new_task.get_mut("resourceFiles") {
        for resource in resources.iter_mut() {
            if let Value::Object(robj) = resource {
                transform_field(robj, "filePath", ctx)?;
                if matches!(robj.get("source"), Some(Value::Object(_))) {
                    if let Some(Value::Object(source)) = robj.get_mut("source") {
                        for key in ["fileGroup", "prefix", "containerUrl", "url"] {
                            transform_field(source, key, ctx)?;
                        }
                    }
                } else {
                    transform_field(robj, "blobSource", ctx)?;
                }
            }
        }
    }

    if let Some(Value::Array(envs)) = new_task.get_mut("environmentSettings") {
        for env in envs.iter_mut() {
            if let Value::Object(eobj) = env {
                transform_field(eobj, "name", ctx)?;
                transform_field(eobj, "value", ctx)?;
            }
        }
    }

    if let Some(Value::Array(outputs)) = new_task.get_mut("outputFiles") {
        for output in outputs.iter_mut() {
            if let Value::Object(oobj) = output {
                transform_field(oobj, "filePattern", ctx)?;
                if let Some(Value::Object(dest)) = oobj.get_mut("destination") {
                    if let Some(Value::Object(container)) = dest.get_mut("container") {
                        for key in ["path", "containerSas"] {
                            transform_field(container, key, ctx)?;
                        }
                    }
                    if let Some(Value::Object(auto)) = dest.get_mut("autoStorage") {
                        for key in ["path", "fileGroup"] {
                            transform_field(auto, key, ctx)?;
                        }
                    }
                }
            }
        }
    }

    if let Some(Value::Object(client_ext)) = new_task.get_mut("clientExtensions") {
        if let Some(Value::Object(docker)) = client_ext.get_mut("dockerOptions") {
            transform_field(docker, "image", ctx)?;
            if let Some(Value::Array(vols)) = docker.get_mut("dataVolumes") {
                for vol in vols.iter_mut() {
                    if let Value::Object(vobj) = vol {
                        transform_field(vobj, "hostPath", ctx)?;
                        transform_field(vobj, "containerPath", ctx)?;
                    }
                }
            }
            if let Some(Value::Array(vols)) = docker.get_mut("sharedDataVolumes") {
                for vol in vols.iter_mut() {
                    if let Value::Object(vobj) = vol {
                        transform_field(vobj, "name", ctx)?;
                        transform_field(vobj, "containerPath", ctx)?;
                    }
                }
            }
        }
    }

    new_task.insert("id".into(), Value::String(index.to_string()));
    Ok(new_task)
}

fn attach_merge_task_dependency(merge_task: &mut JsonObject, task_count: usize) {
    merge_task.insert("id".into(), Value::String("merge".into()));
    let mut ranges = JsonObject::new();
    ranges.insert("start".into(), Value::from(0));
    ranges.insert("end".into(), Value::from(task_count as i64 - 1));
    let mut depends_on = JsonObject::new();
    depends_on.insert("taskIdRanges".into(), Value::Object(ranges));
    merge_task.insert("dependsOn".into(), Value::Object(depends_on));
}

/// Dispatches a job's `taskFactory` to the matching expander, consuming
/// the `taskFactory` key from `job`.
pub fn expand_task_factory(job: &mut JsonObject, storage: &dyn Storage) -> Result<Vec<JsonObject>> {
    let factory_value = job
        .remove("taskFactory")
        .ok_or_else(|| Error::Validation("job has no taskFactory defined".into()))?;
    let factory = factory_value
        .as_object()
        .ok_or_else(|| Error::Validation("taskFactory must be an object".into()))?;
    let factory_type = factory
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation("no type property defined in taskFactory".into()))?;
    match factory_type {
        "parametricSweep" => sweep::expand(factory),
        "taskCollection" => collection::expand(factory),
        "taskPerFile" => perfile::expand(factory, storage),
        other => Err(Error::Validation(format!("'{other}' is not a supported task factory type"))),
    }
}
