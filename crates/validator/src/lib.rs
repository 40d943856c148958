//! Service config validation for protoc-gen-go-grpc-service-config
//!
//! Two independent checks are provided:
//!
//! - [`ServiceConfigDocument`]: a lenient parse of the method config names,
//!   used to decide whether a config covers a given service.
//! - [`LiveDialChecker`]: proves a config is valid by dialing a local gRPC
//!   server with a client configured from it, instead of keeping a separate
//!   schema validator in sync with what clients accept.
//!
//! # Examples
//!
//! ```no_run
//! use grpc_service_config_validator::{ConfigChecker, LiveDialChecker, ServiceConfigDocument};
//! use std::path::Path;
//!
//! let path = Path::new("proto/einride/example/v1/example_grpc_service_config.json");
//! let text = std::fs::read_to_string(path).unwrap();
//!
//! let mut checker = LiveDialChecker::start().unwrap();
//! checker.check(path, &text).unwrap();
//! checker.shutdown().unwrap();
//!
//! let document = ServiceConfigDocument::parse(text.as_bytes()).unwrap();
//! assert!(document.applies("einride.example.v1.ExampleService"));
//! ```

pub mod client_config;
mod dial;
mod document;
mod keys;

pub use client_config::{ClientServiceConfig, ServiceConfigError};
pub use dial::{DialError, LiveDialChecker, OnDemandDialChecker};
pub use document::{MethodConfigEntry, MethodName, ServiceConfigDocument};

use grpc_service_config_common::Result;
use std::path::Path;

/// Decides whether a service config would be accepted by its consumers
pub trait ConfigChecker {
    /// Check the config text read from `path`
    ///
    /// Fails with `PluginError::InvalidServiceConfig` naming `path` when the
    /// config is rejected.
    fn check(&mut self, path: &Path, config: &str) -> Result<()>;
}
