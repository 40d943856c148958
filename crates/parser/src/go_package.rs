//! Go package resolution for proto files
//!
//! Mirrors how protoc-gen-go decides where a proto file's generated code lives,
//! so that the embedded service config lands in the same Go package as the
//! service stubs generated by the other plugins in the pipeline.

use grpc_service_config_common::{GoTarget, PathsMode, PluginError, PluginOptions, Result};

const GO_KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Resolve the Go import path, package name, and generated file prefix of a proto file
///
/// `go_package` is the value of the file's `go_package` option, if any. An `M`
/// mapping for the file in `options` takes precedence over it.
pub fn resolve_go_target(
    file_name: &str,
    go_package: Option<&str>,
    options: &PluginOptions,
) -> Result<GoTarget> {
    let source = options
        .import_mappings
        .get(file_name)
        .map(String::as_str)
        .or(go_package)
        .unwrap_or_default();

    let (import_path, explicit_name) = split_go_package(source);
    if import_path.is_empty() {
        return Err(PluginError::Parse(format!(
            "unable to determine Go import path for {:?}",
            file_name
        )));
    }

    let package_name = match explicit_name {
        Some(name) => sanitize_package_name(name),
        None => sanitize_package_name(base_name(import_path)),
    };

    let filename_prefix = filename_prefix(file_name, import_path, options)?;

    Ok(GoTarget {
        import_path: import_path.to_string(),
        package_name,
        filename_prefix,
    })
}

/// Split `"example.com/foo;foopb"` into the import path and optional package name
fn split_go_package(value: &str) -> (&str, Option<&str>) {
    match value.split_once(';') {
        Some((path, name)) => (path, Some(name)),
        None => (value, None),
    }
}

/// Turn an arbitrary string into a valid Go package identifier
///
/// Examples:
/// - "v1" -> "v1"
/// - "foo-bar" -> "foo_bar"
/// - "1api" -> "_1api"
/// - "type" -> "_type"
pub fn sanitize_package_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();

    let starts_with_letter = sanitized.chars().next().is_some_and(char::is_alphabetic);
    if !starts_with_letter || GO_KEYWORDS.contains(&sanitized.as_str()) {
        format!("_{}", sanitized)
    } else {
        sanitized
    }
}

fn filename_prefix(file_name: &str, import_path: &str, options: &PluginOptions) -> Result<String> {
    let stem = file_name
        .strip_suffix(".proto")
        .or_else(|| file_name.strip_suffix(".protodevel"))
        .unwrap_or(file_name);

    let prefix = match options.paths {
        PathsMode::SourceRelative => stem.to_string(),
        PathsMode::Import => format!("{}/{}", import_path.trim_end_matches('/'), base_name(stem)),
    };

    match options.module.as_deref() {
        None => Ok(prefix),
        Some(module) => prefix
            .strip_prefix(module)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(String::from)
            .ok_or_else(|| {
                PluginError::Parse(format!(
                    "{}: generated file prefix {:?} does not match module {:?}",
                    file_name, prefix, module
                ))
            }),
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
