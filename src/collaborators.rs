use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{JsonObject, ResolvedFile};

/// Resolves abstract `resourceFiles`/`commonResourceFiles` entries and
/// storage-container facts the expander needs but cannot fetch itself.
/// Implemented against the real batch/blob SDKs by the consuming
/// application; tests use small in-memory fakes.
pub trait Storage {
    /// Expand one `resourceFiles`/`commonResourceFiles` entry into the
    /// concrete entries the batch service accepts. One abstract reference
    /// (e.g. a file group) may expand to many concrete ones.
    fn resolve_resource_file(&self, entry: &JsonObject) -> Result<Vec<JsonObject>>;

    /// A SAS URL for uploading outputs into the named auto-storage file group.
    fn get_container_sas(&self, file_group: &str) -> Result<String>;

    /// The concrete file list backing a `taskPerFile` factory's `source`.
    fn get_container_list(&self, source: &Value) -> Result<Vec<ResolvedFile>>;
}

/// Interactive parameter prompting, used only by `pipeline::expand_template`
/// when a declared parameter has neither a supplied value nor a default.
pub trait Prompter {
    fn prompt(&self, message: &str) -> Result<String>;
    fn warn(&self, message: &str);
}

/// Filesystem seam so the pipeline's file-reading calls can be faked in tests.
pub trait FileSource {
    fn read_file(&self, path: &Path) -> Result<String>;
}

/// `FileSource` backed directly by `std::fs`.
pub struct StdFileSource;

impl FileSource for StdFileSource {
    fn read_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
