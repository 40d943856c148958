//! CodeGeneratorRequest parser

use crate::options::parse_parameter;
use grpc_service_config_common::{PluginError, PluginOptions, ProtoFile, Result};
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::compiler::CodeGeneratorRequest;
use prost_types::FileDescriptorSet;
use std::fs;
use std::io::Read;
use std::path::Path;

/// protoc plugin request
///
/// Wraps a `CodeGeneratorRequest`: the files protoc asked for, the parameter
/// string, and the descriptors of those files and everything they import.
#[derive(Debug, Clone)]
pub struct PluginRequest {
    request: CodeGeneratorRequest,
}

impl PluginRequest {
    /// Decode a serialized `CodeGeneratorRequest`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let request = CodeGeneratorRequest::decode(bytes).map_err(|e| {
            PluginError::Parse(format!("Failed to decode CodeGeneratorRequest: {}", e))
        })?;
        Ok(Self { request })
    }

    /// Read and decode a `CodeGeneratorRequest`, typically from stdin
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::decode(&bytes)
    }

    /// Build a request from a FileDescriptorSet file
    ///
    /// # Example
    /// ```rust,ignore
    /// let request = PluginRequest::from_descriptor_set_file(
    ///     "descriptor.pb",
    ///     &["einride/example/v1/example_service.proto".to_string()],
    ///     "path=proto,validate=true",
    /// )?;
    /// ```
    pub fn from_descriptor_set_file<P: AsRef<Path>>(
        path: P,
        files_to_generate: &[String],
        parameter: &str,
    ) -> Result<Self> {
        let bytes = fs::read(path.as_ref()).map_err(|e| {
            PluginError::Parse(format!(
                "Failed to read FileDescriptorSet file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_file_descriptor_set(&bytes, files_to_generate, parameter)
    }

    /// Build a request from serialized FileDescriptorSet bytes
    ///
    /// An empty `files_to_generate` selects every file in the set.
    pub fn from_file_descriptor_set(
        bytes: &[u8],
        files_to_generate: &[String],
        parameter: &str,
    ) -> Result<Self> {
        let file_descriptor_set = FileDescriptorSet::decode(bytes).map_err(|e| {
            PluginError::Parse(format!("Failed to decode FileDescriptorSet: {}", e))
        })?;

        let file_to_generate = if files_to_generate.is_empty() {
            file_descriptor_set
                .file
                .iter()
                .map(|f| f.name().to_string())
                .collect()
        } else {
            for name in files_to_generate {
                if !file_descriptor_set.file.iter().any(|f| f.name() == name) {
                    return Err(PluginError::Parse(format!(
                        "File {} not found in FileDescriptorSet",
                        name
                    )));
                }
            }
            files_to_generate.to_vec()
        };

        Ok(Self {
            request: CodeGeneratorRequest {
                file_to_generate,
                parameter: Some(parameter.to_string()),
                proto_file: file_descriptor_set.file,
                ..Default::default()
            },
        })
    }

    /// Raw parameter string passed by protoc
    pub fn parameter(&self) -> &str {
        self.request.parameter()
    }

    /// Parse the parameter string into plugin options
    pub fn options(&self) -> Result<PluginOptions> {
        parse_parameter(self.parameter())
    }

    /// Files protoc asked the plugin to generate code for
    pub fn files_to_generate(&self) -> &[String] {
        &self.request.file_to_generate
    }

    /// Convert the request into proto files with resolved services
    pub fn parse(&self, options: &PluginOptions) -> Result<Vec<ProtoFile>> {
        let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
            file: self.request.proto_file.clone(),
        })
        .map_err(|e| PluginError::Parse(format!("Failed to create DescriptorPool: {}", e)))?;

        super::converter::convert_request_to_files(&pool, &self.request, options)
    }

    /// Get reference to the underlying request
    pub fn request(&self) -> &CodeGeneratorRequest {
        &self.request
    }
}

impl From<CodeGeneratorRequest> for PluginRequest {
    fn from(request: CodeGeneratorRequest) -> Self {
        Self { request }
    }
}
