//! Converts protobuf descriptors to the plugin's ProtoFile IR

use crate::go_package::resolve_go_target;
use grpc_service_config_common::{
    GoTarget, PluginError, PluginOptions, ProtoFile, Result, ServiceDescriptor,
};
use prost_reflect::DescriptorPool;
use prost_types::compiler::CodeGeneratorRequest;
use std::collections::HashSet;

/// Convert the files of a request, in request order
///
/// Go package resolution is only mandatory for files protoc asked us to
/// generate; imported files get an empty target when it cannot be resolved.
pub fn convert_request_to_files(
    pool: &DescriptorPool,
    request: &CodeGeneratorRequest,
    options: &PluginOptions,
) -> Result<Vec<ProtoFile>> {
    let targets: HashSet<&str> = request
        .file_to_generate
        .iter()
        .map(String::as_str)
        .collect();

    let mut files = Vec::with_capacity(request.proto_file.len());

    for proto in &request.proto_file {
        let name = proto.name();
        let file = pool.get_file_by_name(name).ok_or_else(|| {
            PluginError::Parse(format!("File {} missing from DescriptorPool", name))
        })?;

        let generate = targets.contains(name);
        let go_package = proto
            .options
            .as_ref()
            .and_then(|o| o.go_package.as_deref());

        let go = if generate {
            resolve_go_target(name, go_package, options)?
        } else {
            resolve_go_target(name, go_package, options).unwrap_or_else(|_| GoTarget::default())
        };

        let services = file
            .services()
            .map(|service| ServiceDescriptor {
                full_name: service.full_name().to_string(),
                package: file.package_name().to_string(),
                source_file: name.to_string(),
                go: go.clone(),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            file = name,
            generate,
            services = services.len(),
            "converted proto file"
        );

        files.push(ProtoFile {
            name: name.to_string(),
            package: file.package_name().to_string(),
            generate,
            services,
        });
    }

    Ok(files)
}
