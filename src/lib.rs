//! Template and task-factory expansion core for a cloud batch-compute job
//! submitter: renders ARM-style expression templates, expands
//! `taskFactory` declarations into concrete task lists, merges application
//! templates into jobs, and wraps task command lines for package
//! installation and output-file upload.

pub mod apptemplate;
pub mod collaborators;
pub mod egress;
pub mod error;
pub mod expr;
pub mod factory;
pub mod model;
pub mod params;
pub mod pipeline;
pub mod placeholder;
pub mod render;
pub mod resourcefiles;
pub mod scanner;
pub mod wrapper;

pub use collaborators::{FileSource, Prompter, StdFileSource, Storage};
pub use error::{Error, Result};
pub use model::{JsonObject, OsFlavor, ParameterDefinition, ParameterType, SetupCommandFragment};
