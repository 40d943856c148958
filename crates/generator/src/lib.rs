//! Go code generation for gRPC service configs
//!
//! Each service config file becomes one Go source file declaring a
//! `ServiceConfig` string constant that holds the config verbatim. The file is
//! placed in the Go package of the first proto file whose service referenced
//! the config; later references to the same config produce nothing.

mod record;
mod templates;

pub use record::GenerationRecord;
pub use templates::go_string_literal;

use grpc_service_config_common::{GeneratedFile, PluginError, Result, ServiceDescriptor};
use std::path::Path;
use tera::{Context, Tera};
use tracing::debug;

/// Service config generator
///
/// Holds the loaded templates and the [`GenerationRecord`] for one plugin run.
pub struct ServiceConfigGenerator {
    tera: Tera,
    record: GenerationRecord,
}

impl ServiceConfigGenerator {
    /// Create a generator with an empty record
    pub fn new() -> Result<Self> {
        let tera = templates::load_templates()?;
        Ok(Self {
            tera,
            record: GenerationRecord::new(),
        })
    }

    /// Config files emitted so far
    pub fn record(&self) -> &GenerationRecord {
        &self.record
    }

    /// Emit the Go file embedding `data`, the contents of `config_path`
    ///
    /// Returns `None` when `config_path` was already emitted during this run.
    pub fn emit(
        &mut self,
        service: &ServiceDescriptor,
        config_path: &Path,
        data: &[u8],
    ) -> Result<Option<GeneratedFile>> {
        if self.record.contains(config_path) {
            debug!(
                service = %service.full_name,
                path = %config_path.display(),
                "service config already generated"
            );
            return Ok(None);
        }

        let config = std::str::from_utf8(data).map_err(|e| PluginError::ConfigParse {
            path: config_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config_file_name = config_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PluginError::Generation(format!(
                    "Service config path has no file name: {}",
                    config_path.display()
                ))
            })?;

        let mut context = Context::new();
        context.insert("service", service);
        context.insert("config", config);
        context.insert("config_file_name", &config_file_name);

        let content = self
            .tera
            .render(templates::SERVICE_CONFIG_TEMPLATE, &context)
            .map_err(|e| PluginError::Generation(format!("Template error: {}", e)))?;

        let name = output_name(&service.go.filename_prefix, &config_file_name);
        self.record.insert(config_path);

        debug!(
            service = %service.full_name,
            path = %config_path.display(),
            output = %name,
            "generated service config"
        );

        Ok(Some(GeneratedFile { name, content }))
    }
}

/// Output path next to the other files generated for the same proto file
fn output_name(filename_prefix: &str, config_file_name: &str) -> String {
    match filename_prefix.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() && dir != "." => {
            format!("{}/{}.go", dir, config_file_name)
        }
        _ => format!("{}.go", config_file_name),
    }
}
