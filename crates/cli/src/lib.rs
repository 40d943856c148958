//! protoc-gen-go-grpc-service-config
//!
//! A protoc plugin that embeds each package's gRPC service config into the
//! generated Go package as a string constant, optionally proving the config
//! valid by dialing a local gRPC server with it first.

pub mod driver;
pub mod logging;
