//! protoc plugin request decoding
//!
//! Decodes the `CodeGeneratorRequest` that protoc writes to the plugin's stdin
//! into the plugin's intermediate representation.
//!
//! ## Sources
//! - **CodeGeneratorRequest**: read from stdin when invoked by protoc
//! - **FileDescriptorSet**: written by `protoc --descriptor_set_out --include_imports`,
//!   used when running the plugin standalone
//!
//! ## Example
//! ```rust,ignore
//! use grpc_service_config_parser::PluginRequest;
//!
//! let request = PluginRequest::from_reader(std::io::stdin())?;
//! let options = request.options()?;
//! let files = request.parse(&options)?;
//! ```

mod converter;
mod parser;

pub use parser::PluginRequest;
