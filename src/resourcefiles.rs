//! Post-processing pass that walks a job/pool/task document and replaces
//! every `resourceFiles`/`commonResourceFiles` array with the concrete
//! entries the injected `Storage` collaborator resolves them to. One
//! abstract reference can expand to many concrete ones, so this runs last,
//! after task factories and application templates have already shaped the
//! document.

use serde_json::Value;

use crate::collaborators::Storage;
use crate::error::Result;

/// Recursively walks `value`, replacing any `resourceFiles`/
/// `commonResourceFiles` array found on an object with the storage
/// collaborator's resolved entries.
pub fn post_process(value: &mut Value, storage: &dyn Storage) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                post_process(item, storage)?;
            }
        }
        Value::Object(obj) => {
            let keys: Vec<String> = obj.keys().cloned().collect();
            for key in keys {
                let is_resource_list =
                    (key == "resourceFiles" || key == "commonResourceFiles") && matches!(obj.get(&key), Some(Value::Array(_)));
                if is_resource_list {
                    if let Some(Value::Array(entries)) = obj.remove(&key) {
                        let mut resolved = Vec::new();
                        for entry in entries {
                            let entry_obj = entry.as_object().cloned().unwrap_or_default();
                            resolved.extend(storage.resolve_resource_file(&entry_obj)?.into_iter().map(Value::Object));
                        }
                        obj.insert(key, Value::Array(resolved));
                    }
                } else if let Some(nested) = obj.get_mut(&key) {
                    if nested.is_object() || nested.is_array() {
                        post_process(nested, storage)?;
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JsonObject;
    use serde_json::json;

    struct ExpandingStorage;

    impl Storage for ExpandingStorage {
        fn resolve_resource_file(&self, entry: &JsonObject) -> Result<Vec<JsonObject>> {
            let group = entry.get("fileGroup").and_then(|v| v.as_str()).unwrap_or("g");
            Ok((0..2)
                .map(|i| {
                    let mut o = JsonObject::new();
                    o.insert("blobSource".into(), json!(format!("https://x/{group}/{i}")));
                    o.insert("filePath".into(), json!(format!("{group}-{i}")));
                    o
                })
                .collect())
        }

        fn get_container_sas(&self, _file_group: &str) -> Result<String> {
            unreachable!()
        }

        fn get_container_list(&self, _source: &Value) -> Result<Vec<crate::model::ResolvedFile>> {
            unreachable!()
        }
    }

    #[test]
    fn expands_nested_resource_file_lists() {
        let mut doc = json!({
            "job": {
                "id": "j1",
                "jobPreparationTask": {
                    "resourceFiles": [{"fileGroup": "data"}]
                },
                "tasks": [
                    {"id": "t1", "resourceFiles": [{"fileGroup": "models"}]}
                ]
            }
        });
        post_process(&mut doc, &ExpandingStorage).unwrap();

        let prep_files = doc["job"]["jobPreparationTask"]["resourceFiles"].as_array().unwrap();
        assert_eq!(prep_files.len(), 2);
        assert_eq!(prep_files[0]["filePath"], json!("data-0"));

        let task_files = doc["job"]["tasks"][0]["resourceFiles"].as_array().unwrap();
        assert_eq!(task_files.len(), 2);
        assert_eq!(task_files[1]["filePath"], json!("models-1"));
    }

    #[test]
    fn document_without_resource_files_is_unchanged() {
        let mut doc = json!({"job": {"id": "j1"}});
        let before = doc.clone();
        post_process(&mut doc, &ExpandingStorage).unwrap();
        assert_eq!(doc, before);
    }
}
