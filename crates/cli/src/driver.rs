//! Plugin driver
//!
//! Walks every service of the files protoc asked for, locates its service
//! config, optionally validates it, and emits one Go file per distinct config.

use grpc_service_config_common::{
    GeneratedFile, PluginError, PluginOptions, ProtoFile, Result, ServiceDescriptor,
};
use grpc_service_config_generator::{GenerationRecord, ServiceConfigGenerator};
use grpc_service_config_parser::{locator, PluginRequest};
use grpc_service_config_validator::{ConfigChecker, OnDemandDialChecker, ServiceConfigDocument};
use prost_types::compiler::code_generator_response::{Feature, File};
use prost_types::compiler::CodeGeneratorResponse;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Run one generation pass, dialing a local server when validation needs it
///
/// The local server is stopped before returning, whether or not the pass
/// succeeded.
pub fn generate(files: &[ProtoFile], options: &PluginOptions) -> Result<Vec<GeneratedFile>> {
    let mut checker = OnDemandDialChecker::new();
    let result = generate_with(files, options, &mut checker);

    match (result, checker.shutdown()) {
        (Ok(generated), Ok(())) => Ok(generated),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(shutdown)) => {
            warn!("failed to stop service config checker: {}", shutdown);
            Err(e)
        }
    }
}

/// Run one generation pass with `checker` deciding config validity
///
/// The first error aborts the pass.
pub fn generate_with<C: ConfigChecker>(
    files: &[ProtoFile],
    options: &PluginOptions,
    checker: &mut C,
) -> Result<Vec<GeneratedFile>> {
    let mut generator = ServiceConfigGenerator::new()?;
    let mut checked = GenerationRecord::new();
    let mut generated = Vec::new();

    for file in files.iter().filter(|file| file.generate) {
        for service in &file.services {
            let path = locator::resolve(service, &options.path);
            debug!(service = %service.full_name, path = %path.display(), "resolved service config");

            if !config_exists(&path)? {
                if options.required {
                    return Err(PluginError::ConfigFileMissing {
                        service: service.full_name.clone(),
                        path,
                    });
                }
                debug!(service = %service.full_name, "no service config, skipping");
                continue;
            }

            let data = fs::read(&path)?;

            if options.validate {
                validate(service, &path, &data, options.required, checker, &mut checked)?;
            }

            ServiceConfigDocument::parse(&data).map_err(|e| PluginError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?;

            if let Some(file) = generator.emit(service, &path, &data)? {
                generated.push(file);
            }
        }
    }

    info!(files = generated.len(), "generated service config files");
    Ok(generated)
}

fn validate<C: ConfigChecker>(
    service: &ServiceDescriptor,
    path: &Path,
    data: &[u8],
    required: bool,
    checker: &mut C,
    checked: &mut GenerationRecord,
) -> Result<()> {
    if checked.insert(path) {
        let text = std::str::from_utf8(data).map_err(|e| PluginError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        checker.check(path, text)?;
    }

    if required {
        let document = ServiceConfigDocument::parse(data).map_err(|e| {
            PluginError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        if !document.applies(&service.full_name) {
            return Err(PluginError::ConfigNotApplicable {
                service: service.full_name.clone(),
                path: path.to_path_buf(),
            });
        }
    }

    Ok(())
}

fn config_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Answer a protoc request
///
/// Failures are reported through `CodeGeneratorResponse.error` with no files,
/// which makes protoc print the error and exit non-zero.
pub fn handle_request(request: impl Into<PluginRequest>) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    };

    match run(request.into()) {
        Ok(files) => {
            response.file = files
                .into_iter()
                .map(|file| File {
                    name: Some(file.name),
                    content: Some(file.content),
                    ..Default::default()
                })
                .collect();
        }
        Err(e) => response.error = Some(e.to_string()),
    }

    response
}

/// Parse a request and run a generation pass over it
pub fn run(request: PluginRequest) -> Result<Vec<GeneratedFile>> {
    let options = request.options()?;
    let files = request.parse(&options)?;
    generate(&files, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpc_service_config_common::GoTarget;
    use mockall::mock;
    use prost_types::compiler::CodeGeneratorRequest;
    use std::path::PathBuf;
    use tempfile::TempDir;

    mock! {
        Checker {}

        impl ConfigChecker for Checker {
            fn check(&mut self, path: &Path, config: &str) -> Result<()>;
        }
    }

    const CONFIG: &str = r#"{"methodConfig": [{"name": [{"service": "einride.example.v1.ExampleService"}], "timeout": "5s"}]}"#;

    fn service(name: &str, source_file: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            full_name: format!("einride.example.v1.{}", name),
            package: "einride.example.v1".to_string(),
            source_file: source_file.to_string(),
            go: GoTarget {
                import_path: "go.einride.tech/example/v1".to_string(),
                package_name: "examplev1".to_string(),
                filename_prefix: format!(
                    "go.einride.tech/example/v1/{}",
                    source_file.trim_end_matches(".proto").rsplit('/').next().unwrap()
                ),
            },
        }
    }

    fn proto_file(source_file: &str, services: &[&str]) -> ProtoFile {
        ProtoFile {
            name: source_file.to_string(),
            package: "einride.example.v1".to_string(),
            generate: true,
            services: services.iter().map(|s| service(s, source_file)).collect(),
        }
    }

    fn write_config(dir: &TempDir, config: &str) -> PathBuf {
        let config_dir = dir.path().join("einride/example/v1");
        fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("example_grpc_service_config.json");
        fs::write(&path, config).unwrap();
        path
    }

    fn options(dir: &TempDir, validate: bool, required: bool) -> PluginOptions {
        PluginOptions {
            path: dir.path().to_path_buf(),
            validate,
            required,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_config_is_skipped_when_optional() {
        let dir = TempDir::new().unwrap();
        let files = [proto_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService"],
        )];

        let mut checker = MockChecker::new();
        checker.expect_check().never();

        let generated = generate_with(&files, &options(&dir, true, false), &mut checker).unwrap();
        assert!(generated.is_empty());
    }

    #[test]
    fn test_missing_config_fails_when_required() {
        let dir = TempDir::new().unwrap();
        let files = [proto_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService"],
        )];

        let mut checker = MockChecker::new();
        checker.expect_check().never();

        let err = generate_with(&files, &options(&dir, false, true), &mut checker).unwrap_err();
        match err {
            PluginError::ConfigFileMissing { service, path } => {
                assert_eq!(service, "einride.example.v1.ExampleService");
                assert!(path.ends_with("einride/example/v1/example_grpc_service_config.json"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_config_is_checked_once_per_path() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, CONFIG);
        let files = [
            proto_file("einride/example/v1/example_service.proto", &["ExampleService"]),
            proto_file("einride/example/v1/other_service.proto", &["OtherService"]),
        ];

        let mut checker = MockChecker::new();
        checker
            .expect_check()
            .withf(move |path, config| path == config_path.as_path() && config == CONFIG)
            .times(1)
            .returning(|_, _| Ok(()));

        let generated = generate_with(&files, &options(&dir, true, false), &mut checker).unwrap();

        assert_eq!(generated.len(), 1);
        assert_eq!(
            generated[0].name,
            "go.einride.tech/example/v1/example_grpc_service_config.json.go"
        );
        assert!(generated[0]
            .content
            .contains("// source: einride/example/v1/example_service.proto"));
    }

    #[test]
    fn test_checker_rejection_aborts() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, CONFIG);
        let files = [proto_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService"],
        )];

        let mut checker = MockChecker::new();
        checker.expect_check().times(1).returning(|path, _| {
            Err(PluginError::InvalidServiceConfig {
                path: path.to_path_buf(),
                message: "invalid retry policy".to_string(),
            })
        });

        let err = generate_with(&files, &options(&dir, true, false), &mut checker).unwrap_err();
        assert!(matches!(err, PluginError::InvalidServiceConfig { .. }));
    }

    #[test]
    fn test_required_config_must_apply_to_every_service() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, CONFIG);
        let files = [proto_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService", "OtherService"],
        )];

        let mut checker = MockChecker::new();
        checker.expect_check().times(1).returning(|_, _| Ok(()));

        let err = generate_with(&files, &options(&dir, true, true), &mut checker).unwrap_err();
        match err {
            PluginError::ConfigNotApplicable { service, .. } => {
                assert_eq!(service, "einride.example.v1.OtherService");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_applicability_is_not_checked_without_validate() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, CONFIG);
        let files = [proto_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService", "OtherService"],
        )];

        let mut checker = MockChecker::new();
        checker.expect_check().never();

        let generated = generate_with(&files, &options(&dir, false, true), &mut checker).unwrap();
        assert_eq!(generated.len(), 1);
    }

    #[test]
    fn test_malformed_config_fails_without_validate() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "{ not json");
        let files = [proto_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService"],
        )];

        let mut checker = MockChecker::new();
        checker.expect_check().never();

        let err = generate_with(&files, &options(&dir, false, false), &mut checker).unwrap_err();
        assert!(matches!(err, PluginError::ConfigParse { .. }));
        assert!(err.to_string().starts_with("run: invalid service config file"));
    }

    #[test]
    fn test_files_not_requested_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut dependency = proto_file("einride/example/v1/example_service.proto", &["ExampleService"]);
        dependency.generate = false;

        let mut checker = MockChecker::new();
        checker.expect_check().never();

        let generated =
            generate_with(&[dependency], &options(&dir, true, true), &mut checker).unwrap();
        assert!(generated.is_empty());
    }

    #[test]
    fn test_handle_request_reports_parameter_errors() {
        let request = CodeGeneratorRequest {
            parameter: Some("unknown=1".to_string()),
            ..Default::default()
        };

        let response = handle_request(request);
        assert!(response.error.is_some());
        assert!(response.file.is_empty());
        assert_eq!(
            response.supported_features,
            Some(Feature::Proto3Optional as u64)
        );
    }

    #[test]
    fn test_handle_empty_request() {
        let response = handle_request(CodeGeneratorRequest::default());
        assert_eq!(response.error, None);
        assert!(response.file.is_empty());
    }
}
