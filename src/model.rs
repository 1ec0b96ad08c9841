use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Alias for the open-ended JSON object shape most of the tree is kept in.
/// Job/task/template documents carry vendor extensions this crate never
/// inspects, so only the shapes below get dedicated structs.
pub type JsonObject = Map<String, Value>;

/// Loose `str(value)`-style rendering used both by the parameter validators
/// (to decide whether a round-trip through `i64`/`bool` changed the text)
/// and by error messages that quote the offending value.
pub fn value_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// ARM parameter values may arrive wrapped as `{"value": ...}` or as the
/// raw value itself; this unwraps exactly one layer, matching the
/// `user_value['value']` / `TypeError: pass` dance in the original.
pub fn unwrap_value_form(v: &Value) -> Value {
    if let Value::Object(m) = v {
        if let Some(inner) = m.get("value") {
            return inner.clone();
        }
    }
    v.clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFlavor {
    Windows,
    Linux,
}

impl OsFlavor {
    /// A pool with no `imageReference.publisher`, or one that names
    /// `MicrosoftWindowsServer`, targets Windows; everything else is Linux.
    pub fn from_pool(pool: &JsonObject) -> Self {
        let publisher = pool
            .get("virtualMachineConfiguration")
            .and_then(|v| v.get("imageReference"))
            .and_then(|v| v.get("publisher"))
            .and_then(|v| v.as_str());
        match publisher {
            None => OsFlavor::Windows,
            Some(p) if p.contains("MicrosoftWindowsServer") => OsFlavor::Windows,
            Some(_) => OsFlavor::Linux,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Int,
    String,
    Bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterDefinition {
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(rename = "defaultValue", default)]
    pub default_value: Option<Value>,
    #[serde(rename = "minValue", default)]
    pub min_value: Option<i64>,
    #[serde(rename = "maxValue", default)]
    pub max_value: Option<i64>,
    #[serde(rename = "minLength", default)]
    pub min_length: Option<usize>,
    #[serde(rename = "maxLength", default)]
    pub max_length: Option<usize>,
    #[serde(rename = "allowedValues", default)]
    pub allowed_values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterSet {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Apt,
    Yum,
    Chocolatey,
    Application,
}

#[derive(Debug, Clone)]
pub struct PackageReference {
    pub kind: PackageKind,
    pub id: String,
    pub version: Option<String>,
    pub allow_empty_checksums: bool,
    pub disable_excludes: Option<String>,
}

impl PackageReference {
    pub fn from_json(v: &Value) -> Result<Self> {
        let obj = v
            .as_object()
            .ok_or_else(|| Error::Validation("a PackageReference must be an object".into()))?;
        let type_str = obj.get("type").and_then(|v| v.as_str()).filter(|s| !s.is_empty());
        let id = obj.get("id").and_then(|v| v.as_str()).filter(|s| !s.is_empty());
        let (type_str, id) = match (type_str, id) {
            (Some(t), Some(i)) => (t, i),
            _ => {
                return Err(Error::Validation(
                    "A PackageReference must have a 'type' and 'id' element.".into(),
                ))
            }
        };
        let kind = match type_str {
            "aptPackage" => PackageKind::Apt,
            "yumPackage" => PackageKind::Yum,
            "chocolateyPackage" => PackageKind::Chocolatey,
            "applicationPackage" => PackageKind::Application,
            other => {
                return Err(Error::Validation(format!(
                    "unknown PackageReference type '{other}' for id '{id}'"
                )))
            }
        };
        Ok(PackageReference {
            kind,
            id: id.to_string(),
            version: obj.get("version").and_then(|v| v.as_str()).map(String::from),
            allow_empty_checksums: obj
                .get("allowEmptyChecksums")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            disable_excludes: obj
                .get("disableExcludes")
                .map(value_display)
                .filter(|s| !s.is_empty()),
        })
    }
}

/// A `Storage::get_container_list` entry: one concrete file a `taskPerFile`
/// factory will spawn a task for.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub url: String,
    pub file_path: String,
    pub file_name: String,
    pub file_name_without_extension: String,
}

/// One OS-specific command line (plus any resource files it needs staged)
/// to be folded into a pool's start task by `wrapper::setup`.
#[derive(Debug, Clone)]
pub struct SetupCommandFragment {
    pub cmd_line: String,
    pub is_windows: bool,
    pub resource_files: Vec<Value>,
}

/// Job properties an application template is not allowed to leave set on
/// the caller's job (they belong to the template itself).
pub const PROPS_RESERVED_FOR_TEMPLATES: &[&str] = &[
    "jobManagerTask",
    "jobPreparationTask",
    "jobReleaseTask",
    "commonEnvironmentSettings",
    "usesTaskDependencies",
    "onAllTasksComplete",
    "onTaskFailure",
    "taskFactory",
];

/// Extra properties permitted on the template document itself (on top of
/// the reserved set above, which a template is of course allowed to use).
pub const PROPS_PERMITTED_ON_TEMPLATES_EXTRA: &[&str] = &["templateMetadata", "parameters", "metadata"];

/// Job-identity properties a rendered application template may not define.
pub const PROPS_RESERVED_FOR_JOBS: &[&str] = &[
    "id",
    "displayName",
    "priority",
    "constraints",
    "poolInfo",
    "applicationTemplateInfo",
];

/// Properties a `parametricSweep`/`taskPerFile` repeat task is allowed to carry.
pub const PROPS_ON_REPEAT_TASK: &[&str] = &[
    "displayName",
    "resourceFiles",
    "environmentSettings",
    "constraints",
    "userIdentity",
    "exitConditions",
    "clientExtensions",
    "outputFiles",
    "packageReferences",
];

/// Extra properties a `taskCollection` entry may additionally carry.
pub const PROPS_ON_COLLECTION_TASK_EXTRA: &[&str] = &["multiInstanceSettings", "dependsOn"];

pub fn props_on_collection_task() -> Vec<&'static str> {
    PROPS_ON_REPEAT_TASK
        .iter()
        .chain(PROPS_ON_COLLECTION_TASK_EXTRA.iter())
        .copied()
        .collect()
}
