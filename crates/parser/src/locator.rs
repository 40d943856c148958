//! Service config file resolution
//!
//! A service config is shared by every service of a package and lives next to
//! the package's proto files. It is named after the parent of the package, so
//! that `einride.example.v1` looks for `example_grpc_service_config.json`.

use grpc_service_config_common::ServiceDescriptor;
use std::path::{Path, PathBuf};

const FILE_SUFFIX: &str = "_grpc_service_config.json";

/// Resolve the path of the service config file for a service
///
/// The result is `base/<dir of the service's proto file>/<parent>_grpc_service_config.json`.
/// No filesystem access is performed.
pub fn resolve(service: &ServiceDescriptor, base: &Path) -> PathBuf {
    let source_dir = Path::new(&service.source_file)
        .parent()
        .unwrap_or_else(|| Path::new(""));

    base.join(source_dir).join(config_file_name(&service.package))
}

/// File name of the service config for a protobuf package
///
/// Examples:
/// - "einride.example.v1" -> "example_grpc_service_config.json"
/// - "example.v1" -> "example_grpc_service_config.json"
/// - "example" -> "_grpc_service_config.json"
pub fn config_file_name(package: &str) -> String {
    format!("{}{}", parent_package_name(package), FILE_SUFFIX)
}

/// Last segment of the package one level up; empty for top-level packages
fn parent_package_name(package: &str) -> &str {
    match package.rsplit_once('.') {
        Some((parent, _)) => parent.rsplit_once('.').map_or(parent, |(_, name)| name),
        None => "",
    }
}
