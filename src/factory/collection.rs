//! `taskCollection` factory: an explicit, already-concrete list of tasks.
//! Each entry just needs its `id`/`commandLine` pair and is narrowed down
//! to the properties a collection task may carry.

use crate::error::{Error, Result};
use crate::model::{props_on_collection_task, JsonObject};

pub fn expand(factory: &JsonObject) -> Result<Vec<JsonObject>> {
    let tasks = factory
        .get("tasks")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Validation("no tasks are defined in task collection factory".into()))?;

    let allowed = props_on_collection_task();
    let mut result = Vec::with_capacity(tasks.len());
    for task in tasks {
        let obj = task
            .as_object()
            .ok_or_else(|| Error::Validation("each task in a task collection factory must be an object".into()))?;
        let missing_id_or_cmd = || {
            Error::Validation("each task in a task collection factory must have 'id' and 'commandLine' properties".into())
        };
        let id = obj.get("id").and_then(|v| v.as_str()).ok_or_else(missing_id_or_cmd)?;
        let command_line = obj.get("commandLine").ok_or_else(missing_id_or_cmd)?;

        let mut new_task = JsonObject::new();
        new_task.insert("id".into(), serde_json::Value::String(id.to_string()));
        new_task.insert("commandLine".into(), command_line.clone());
        for prop in &allowed {
            if let Some(v) = obj.get(*prop) {
                new_task.insert((*prop).to_string(), v.clone());
            }
        }
        result.push(new_task);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expand_keeps_explicit_task_list() {
        let factory = json!({
            "type": "taskCollection",
            "tasks": [
                {"id": "a", "commandLine": "echo a"},
                {"id": "b", "commandLine": "echo b", "dependsOn": {"taskIds": ["a"]}}
            ]
        });
        let tasks = expand(factory.as_object().unwrap()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1]["dependsOn"]["taskIds"], json!(["a"]));
    }

    #[test]
    fn expand_rejects_task_missing_id() {
        let factory = json!({"type": "taskCollection", "tasks": [{"commandLine": "echo a"}]});
        assert!(expand(factory.as_object().unwrap()).is_err());
    }
}
