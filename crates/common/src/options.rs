//! Plugin options passed through the protoc parameter string

use std::collections::HashMap;
use std::path::PathBuf;

/// How generated file names are derived from proto file names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathsMode {
    /// Place files under the Go import path of the package
    #[default]
    Import,
    /// Place files next to the proto file, relative to the protoc input root
    SourceRelative,
}

/// Options controlling config lookup, validation, and output layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOptions {
    /// Base directory for service config lookup
    pub path: PathBuf,
    /// Validate every service config by dialing a local server with it
    pub validate: bool,
    /// Require every service to have an applicable service config
    pub required: bool,
    /// Output path layout
    pub paths: PathsMode,
    /// Module prefix stripped from generated file names
    pub module: Option<String>,
    /// Proto file to Go import path overrides (`M` parameters)
    pub import_mappings: HashMap<String, String>,
}
