//! Public orchestration entry points: the thin layer a consuming
//! application actually calls, wiring the lower components together in
//! the order a job submission needs them.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use crate::apptemplate;
use crate::collaborators::{FileSource, Prompter, Storage};
use crate::error::{Error, Result};
use crate::factory;
use crate::model::{unwrap_value_form, JsonObject, OsFlavor, ParameterDefinition, SetupCommandFragment};
use crate::params;
use crate::render;
use crate::resourcefiles;
use crate::wrapper;

/// Renders `template_path` (optionally with a parameters file), prompting
/// for any parameter that has neither a supplied value nor a default.
pub fn expand_template(
    template_path: &Path,
    parameters_path: Option<&Path>,
    fs: &dyn FileSource,
    prompter: &dyn Prompter,
) -> Result<Value> {
    let template_text = fs.read_file(template_path)?;
    let template_value: Value = serde_json::from_str(&template_text)
        .map_err(|e| Error::Parse(format!("invalid JSON in template '{}': {e}", template_path.display())))?;
    let template_obj = template_value
        .as_object()
        .ok_or_else(|| Error::Validation("template must be a JSON object".into()))?;

    let supplied_parameters: JsonObject = match parameters_path {
        Some(p) => {
            let text = fs.read_file(p)?;
            serde_json::from_str(&text)
                .map_err(|e| Error::Parse(format!("invalid JSON in parameters file '{}': {e}", p.display())))?
        }
        None => JsonObject::new(),
    };

    let resolved_parameters = resolve_parameters(template_obj, &supplied_parameters, prompter)?;
    render::render_template_text(&template_text, template_obj, &resolved_parameters, 0)
}

/// For each declared parameter: take the supplied value, else the
/// default, else prompt interactively until a valid value is entered.
fn resolve_parameters(template: &JsonObject, supplied: &JsonObject, prompter: &dyn Prompter) -> Result<JsonObject> {
    let mut resolved = JsonObject::new();
    let defs = match template.get("parameters").and_then(|v| v.as_object()) {
        Some(d) => d,
        None => return Ok(resolved),
    };
    for (name, def_value) in defs {
        let def: ParameterDefinition = serde_json::from_value(def_value.clone())
            .map_err(|e| Error::Validation(format!("parameter '{name}' definition is invalid: {e}")))?;

        let mut value = supplied.get(name).map(unwrap_value_form).or_else(|| def.default_value.clone());
        while value.is_none() {
            let description = def_value
                .get("metadata")
                .and_then(|m| m.get("description"))
                .and_then(|d| d.as_str());
            let prompt_text = match description {
                Some(d) => format!("{name} ({d}): "),
                None => format!("{name}: "),
            };
            let raw = prompter.prompt(&prompt_text)?;
            match params::validate_parameter(name, &def, &Value::String(raw)) {
                Ok(v) => value = Some(v),
                Err(e) => prompter.warn(&e.to_string()),
            }
        }
        resolved.insert(name.clone(), value.unwrap());
    }
    Ok(resolved)
}

/// Merges `job.applicationTemplateInfo`'s referenced template into `job`,
/// if present.
pub fn expand_application_template(job: &mut JsonObject, working_dir: &Path, fs: &dyn FileSource) -> Result<()> {
    apptemplate::expand(job, working_dir, fs)
}

/// Dispatches `job.taskFactory` to the matching expander, returning the
/// concrete task list and removing `taskFactory` from `job`.
pub fn expand_task_factory(job: &mut JsonObject, storage: &dyn Storage) -> Result<Vec<JsonObject>> {
    factory::expand_task_factory(job, storage)
}

/// Wraps every task's (and the job manager task's) `outputFiles` for
/// upload, returning the setup-command fragment needed to stage the
/// uploader bundle, or `None` if nothing in the job declares `outputFiles`.
pub fn process_job_for_output_files(
    job: &mut JsonObject,
    tasks: &mut [JsonObject],
    os: OsFlavor,
    storage: &dyn Storage,
) -> Result<Option<SetupCommandFragment>> {
    let mut must_stage_uploader = false;

    if let Some(Value::Object(jm)) = job.get("jobManagerTask").cloned() {
        if jm.contains_key("outputFiles") {
            let wrapped = wrapper::outputfiles::wrap_task_output_files(&jm, os, storage)?;
            job.insert("jobManagerTask".into(), Value::Object(wrapped));
            must_stage_uploader = true;
        }
    }

    for task in tasks.iter_mut() {
        if task.contains_key("outputFiles") {
            *task = wrapper::outputfiles::wrap_task_output_files(task, os, storage)?;
            must_stage_uploader = true;
        }
    }

    if !must_stage_uploader {
        return Ok(None);
    }

    let is_windows = matches!(os, OsFlavor::Windows);
    let setup_cmd = if is_windows {
        "(bootstrap.cmd && setup_uploader.py) > setuplog.txt 2>&1"
    } else {
        "setup_uploader.py > setuplog.txt 2>&1"
    };
    let resource_files = crate::egress::uploader_resource_files(is_windows, None)
        .into_iter()
        .map(Value::Object)
        .collect();

    Ok(Some(SetupCommandFragment {
        cmd_line: setup_cmd.to_string(),
        is_windows,
        resource_files,
    }))
}

/// Builds the install-command fragment for a pool's own `packageReferences`.
pub fn process_pool_package_references(pool: &JsonObject) -> Result<Option<SetupCommandFragment>> {
    let refs = match pool.get("packageReferences") {
        Some(Value::Array(a)) => a,
        Some(_) => return Err(Error::Validation("packageReferences of a pool must be a collection".into())),
        None => return Ok(None),
    };
    let os = OsFlavor::from_pool(pool);
    let parsed = refs
        .iter()
        .map(crate::model::PackageReference::from_json)
        .collect::<Result<Vec<_>>>()?;
    wrapper::packages::installation_command_line(&parsed, os)
}

/// Pulls every task's `packageReferences` off of `tasks` (deduplicating by
/// `id` across the whole job) and returns the combined install-command
/// fragment.
pub fn process_task_package_references(tasks: &mut [JsonObject], os: OsFlavor) -> Result<Option<SetupCommandFragment>> {
    let mut packages = Vec::new();
    let mut seen_ids = HashSet::new();

    for task in tasks.iter_mut() {
        let refs = match task.remove("packageReferences") {
            Some(Value::Array(a)) => a,
            Some(_) => return Err(Error::Validation("packageReferences of a task must be a collection".into())),
            None => continue,
        };
        for reference in refs {
            let id = reference
                .get("id")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::Validation("A PackageReference must have a 'type' and 'id' element.".into()))?
                .to_string();
            if seen_ids.insert(id) {
                packages.push(reference);
            }
        }
    }

    let parsed = packages
        .iter()
        .map(crate::model::PackageReference::from_json)
        .collect::<Result<Vec<_>>>()?;
    wrapper::packages::installation_command_line(&parsed, os)
}

/// Folds package-install and output-file-upload fragments into a pool's
/// start task.
pub fn construct_setup_task(
    existing: Option<&JsonObject>,
    fragments: &[SetupCommandFragment],
    os: OsFlavor,
) -> Result<Option<JsonObject>> {
    wrapper::setup::construct_setup_task(existing, fragments, os)
}

/// Walks the whole request document, resolving abstract
/// `resourceFiles`/`commonResourceFiles` entries via `storage`.
pub fn post_processing(request: &mut Value, storage: &dyn Storage) -> Result<()> {
    resourcefiles::post_process(request, storage)
}

/// Whether any task in `tasks` needs the pool fetched (for its OS flavor)
/// to finish expansion: package references, output files, or docker
/// client extensions all require knowing the target OS.
pub fn should_get_pool(tasks: &[JsonObject]) -> bool {
    tasks.iter().any(|task| {
        is_truthy(task.get("packageReferences"))
            || is_truthy(task.get("outputFiles"))
            || is_truthy(task.get("clientExtensions").and_then(|v| v.get("dockerOptions")))
    })
}

/// Python-truthiness equivalent for the JSON values this crate inspects:
/// `null`/missing, `false`, `0`, `""`, `[]` and `{}` are all falsy.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
