//! `taskPerFile` factory: one task per file returned by the injected
//! `Storage::get_container_list`, substituting file-name placeholders.

use super::{attach_merge_task_dependency, parse_repeat_task, transform_repeat_task, SubstitutionContext};
use crate::collaborators::Storage;
use crate::error::{Error, Result};
use crate::model::JsonObject;

pub fn expand(factory: &JsonObject, storage: &dyn Storage) -> Result<Vec<JsonObject>> {
    let source = factory
        .get("source")
        .ok_or_else(|| Error::Validation("no file source is defined in file iteration task factory".into()))?;
    let files = storage.get_container_list(source)?;

    let repeat_task_value = factory
        .get("repeatTask")
        .and_then(|v| v.as_object())
        .ok_or_else(|| Error::Validation("no repeat task is defined in file iteration task factory".into()))?;
    let repeat_task = parse_repeat_task(repeat_task_value)?;

    let mut tasks = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let ctx = SubstitutionContext::File(file);
        tasks.push(transform_repeat_task(&repeat_task, &ctx, index)?);
    }

    if let Some(merge_value) = factory.get("mergeTask").and_then(|v| v.as_object()) {
        let mut merge_task = parse_repeat_task(merge_value)?;
        attach_merge_task_dependency(&mut merge_task, tasks.len());
        tasks.push(merge_task);
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResolvedFile;
    use serde_json::{json, Value};

    struct FixedFileList(Vec<ResolvedFile>);

    impl Storage for FixedFileList {
        fn resolve_resource_file(&self, _entry: &JsonObject) -> Result<Vec<JsonObject>> {
            unreachable!()
        }
        fn get_container_sas(&self, _file_group: &str) -> Result<String> {
            unreachable!()
        }
        fn get_container_list(&self, _source: &Value) -> Result<Vec<ResolvedFile>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn expand_creates_one_task_per_file() {
        let storage = FixedFileList(vec![
            ResolvedFile {
                url: "https://x/a.txt".into(),
                file_path: "a.txt".into(),
                file_name: "a.txt".into(),
                file_name_without_extension: "a".into(),
            },
            ResolvedFile {
                url: "https://x/b.txt".into(),
                file_path: "b.txt".into(),
                file_name: "b.txt".into(),
                file_name_without_extension: "b".into(),
            },
        ]);
        let factory = json!({
            "type": "taskPerFile",
            "source": {"fileGroup": "data"},
            "repeatTask": {"commandLine": "process {filePath}"}
        });
        let tasks = expand(factory.as_object().unwrap(), &storage).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0]["commandLine"], json!("process a.txt"));
        assert_eq!(tasks[1]["commandLine"], json!("process b.txt"));
    }
}
