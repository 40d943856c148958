//! Plugin parameter parsing
//!
//! protoc passes everything after `--go-grpc-service-config_opt=` as a single
//! comma-separated string of `key[=value]` pairs.

use grpc_service_config_common::{PathsMode, PluginError, PluginOptions, Result};
use std::path::PathBuf;

/// Parse the protoc parameter string into [`PluginOptions`]
///
/// # Example
/// ```
/// use grpc_service_config_parser::parse_parameter;
///
/// let options = parse_parameter("path=proto,validate=true,required").unwrap();
/// assert!(options.validate);
/// assert!(options.required);
/// ```
pub fn parse_parameter(parameter: &str) -> Result<PluginOptions> {
    let mut options = PluginOptions::default();

    for param in parameter.split(',') {
        let (key, value) = match param.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (param, None),
        };

        match key {
            "" => {}
            "path" => options.path = PathBuf::from(value.unwrap_or_default()),
            "validate" => options.validate = parse_bool(key, value)?,
            "required" => options.required = parse_bool(key, value)?,
            "paths" => {
                options.paths = match value {
                    Some("import") => PathsMode::Import,
                    Some("source_relative") => PathsMode::SourceRelative,
                    other => {
                        return Err(PluginError::Parse(format!(
                            "invalid value for paths: {:?} (expected \"import\" or \"source_relative\")",
                            other.unwrap_or_default()
                        )))
                    }
                }
            }
            "module" => {
                options.module = value.filter(|v| !v.is_empty()).map(String::from);
            }
            // Source annotations are not produced for embedded configs
            "annotate_code" => {}
            _ if key.starts_with('M') => {
                options
                    .import_mappings
                    .insert(key[1..].to_string(), value.unwrap_or_default().to_string());
            }
            _ => {
                return Err(PluginError::Parse(format!("unknown parameter {:?}", key)));
            }
        }
    }

    Ok(options)
}

/// Boolean spellings accepted by Go's `strconv.ParseBool`; a bare key means true
fn parse_bool(key: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None => Ok(true),
        Some("1" | "t" | "T" | "TRUE" | "true" | "True") => Ok(true),
        Some("0" | "f" | "F" | "FALSE" | "false" | "False") => Ok(false),
        Some(other) => Err(PluginError::Parse(format!(
            "invalid boolean value {:?} for parameter {}",
            other, key
        ))),
    }
}
