//! File-egress bundle: the helper-script set staged alongside a job prep
//! task so tasks with `outputFiles` can upload on completion.

use serde_json::Value;

use crate::model::JsonObject;

const ROOT_FILE_UPLOAD_URL: &str = "https://raw.githubusercontent.com/Azure/azure-batch-cli-extensions/master";
const WINDOWS_ONLY_RESOURCE: &str = "bootstrap.cmd";
const COMMON_RESOURCES: &[&str] = &[
    "batchfileuploader.py",
    "configuration.py",
    "requirements.txt",
    "setup_uploader.py",
    "uploader.py",
    "util.py",
    "uploadfiles.py",
];

/// The base URL resource files are fetched from: `override_url` if given,
/// else the `FILE_EGRESS_OVERRIDE_URL` environment variable, else the
/// upstream default — always normalized to end in `/`.
pub fn base_url(override_url: Option<&str>) -> String {
    let root = override_url
        .map(String::from)
        .or_else(|| std::env::var("FILE_EGRESS_OVERRIDE_URL").ok())
        .unwrap_or_else(|| ROOT_FILE_UPLOAD_URL.to_string());
    if root.ends_with('/') {
        root
    } else {
        format!("{root}/")
    }
}

/// The resourceFiles entries needed to stage the uploader bundle, plus
/// `bootstrap.cmd` on Windows only.
pub fn uploader_resource_files(is_windows: bool, override_url: Option<&str>) -> Vec<JsonObject> {
    let base = base_url(override_url);
    let mut names: Vec<&str> = COMMON_RESOURCES.to_vec();
    if is_windows {
        names.push(WINDOWS_ONLY_RESOURCE);
    }
    names
        .iter()
        .map(|name| {
            let mut obj = JsonObject::new();
            obj.insert("blobSource".into(), Value::String(format!("{base}{name}")));
            obj.insert("filePath".into(), Value::String((*name).to_string()));
            obj
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_defaults_to_upstream() {
        assert_eq!(
            base_url(None),
            format!("{ROOT_FILE_UPLOAD_URL}/")
        );
    }

    #[test]
    fn base_url_override_gets_trailing_slash() {
        assert_eq!(base_url(Some("https://example.com/bundle")), "https://example.com/bundle/");
    }

    #[test]
    fn windows_bundle_includes_bootstrap() {
        let files = uploader_resource_files(true, Some("https://example.com/"));
        assert!(files.iter().any(|f| f.get("filePath").unwrap() == "bootstrap.cmd"));
        assert_eq!(files.len(), COMMON_RESOURCES.len() + 1);
    }

    #[test]
    fn linux_bundle_excludes_bootstrap() {
        let files = uploader_resource_files(false, Some("https://example.com/"));
        assert!(!files.iter().any(|f| f.get("filePath").unwrap() == "bootstrap.cmd"));
        assert_eq!(files.len(), COMMON_RESOURCES.len());
    }
}
