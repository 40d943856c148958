//! Common types and utilities for protoc-gen-go-grpc-service-config
//!
//! This crate contains the intermediate representation of the protobuf files
//! handed to the plugin, the plugin options, and the error type shared by the
//! parser, validator, generator, and driver crates.

mod options;

pub use options::{PathsMode, PluginOptions};

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Reference documentation for the gRPC service config format
pub const DOC_URL: &str = "https://github.com/grpc/grpc/blob/master/doc/service_config.md";

/// Errors that can occur while resolving, validating, or emitting service configs
#[derive(Error, Debug)]
pub enum PluginError {
    #[error(
        "validate: missing service config file {} for {service} (see: {doc})",
        .path.display(),
        doc = DOC_URL
    )]
    ConfigFileMissing { service: String, path: PathBuf },

    #[error("run: invalid service config file {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("validate: invalid service config {}: {message}", .path.display())]
    InvalidServiceConfig { path: PathBuf, message: String },

    #[error(
        "validate: missing service config for {service} in {} (see: {doc})",
        .path.display(),
        doc = DOC_URL
    )]
    ConfigNotApplicable { service: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Generation error: {0}")]
    Generation(String),
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

/// Go package a proto file generates into
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GoTarget {
    /// Go import path (e.g., "example.com/api/einride/example/v1")
    pub import_path: String,
    /// Go package name (e.g., "examplev1")
    pub package_name: String,
    /// Prefix shared by every file generated for the proto file, relative to
    /// the protoc output directory (e.g., "einride/example/v1/example_service")
    pub filename_prefix: String,
}

/// A protobuf service as seen by the plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    /// Fully-qualified service name (e.g., "einride.example.v1.ExampleService")
    pub full_name: String,
    /// Package of the containing file (e.g., "einride.example.v1")
    pub package: String,
    /// Path of the containing proto file, as given to protoc
    pub source_file: String,
    /// Go output location of the containing file
    pub go: GoTarget,
}

/// A proto file from the descriptor set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoFile {
    /// Path of the proto file, as given to protoc
    pub name: String,
    /// Protobuf package
    pub package: String,
    /// Whether protoc asked the plugin to generate code for this file
    pub generate: bool,
    /// Services declared in the file, in declaration order
    pub services: Vec<ServiceDescriptor>,
}

/// A file produced by the plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Output path relative to the protoc output directory
    pub name: String,
    /// Full file contents
    pub content: String,
}
