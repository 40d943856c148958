//! protoc request parsing for protoc-gen-go-grpc-service-config
//!
//! This crate turns what protoc hands to the plugin into the intermediate
//! representation (`ProtoFile` / `ServiceDescriptor`) and resolves where each
//! service's config file is expected on disk.
//!
//! ## Resolution Strategy
//!
//! A service config is shared by all services of a package and is named after
//! the package's parent:
//! - `einride/example/v1/example_service.proto` (package `einride.example.v1`)
//!   → `<path>/einride/example/v1/example_grpc_service_config.json`

mod go_package;
pub mod locator;
mod options;
mod protobuf;

pub use go_package::{resolve_go_target, sanitize_package_name};
pub use options::parse_parameter;
pub use protobuf::PluginRequest;
