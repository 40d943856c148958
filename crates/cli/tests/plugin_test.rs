//! End-to-end tests for the plugin driver

use grpc_service_config_common::{PluginError, PluginOptions};
use grpc_service_config_parser::PluginRequest;
use grpc_service_config_validator::OnDemandDialChecker;
use prost::Message;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use prost_types::{
    DescriptorProto, FileDescriptorProto, FileOptions, MethodDescriptorProto,
    ServiceDescriptorProto,
};
use protoc_gen_go_grpc_service_config::driver;
use std::fs;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

const CONFIG: &str = r#"{
  "methodConfig": [
    {
      "name": [{}],
      "timeout": "10s",
      "retryPolicy": {
        "maxAttempts": 5,
        "initialBackoff": "0.1s",
        "maxBackoff": "1s",
        "backoffMultiplier": 2,
        "retryableStatusCodes": ["UNAVAILABLE", "UNKNOWN"]
      }
    }
  ]
}
"#;

const OUTPUT_NAME: &str = "go.einride.tech/example/v1/example_grpc_service_config.json.go";

fn service(name: &str) -> ServiceDescriptorProto {
    ServiceDescriptorProto {
        name: Some(name.to_string()),
        method: vec![MethodDescriptorProto {
            name: Some(format!("Get{}", name)),
            input_type: Some(".einride.example.v1.Thing".to_string()),
            output_type: Some(".einride.example.v1.Thing".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn example_file(name: &str, services: &[&str]) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some("einride.example.v1".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Thing".to_string()),
            ..Default::default()
        }],
        service: services.iter().map(|s| service(s)).collect(),
        options: Some(FileOptions {
            go_package: Some("go.einride.tech/example/v1;examplev1".to_string()),
            ..Default::default()
        }),
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn request(dir: &TempDir, parameter: &str) -> CodeGeneratorRequest {
    CodeGeneratorRequest {
        file_to_generate: vec!["einride/example/v1/example_service.proto".to_string()],
        parameter: Some(format!("path={},{}", dir.path().display(), parameter)),
        proto_file: vec![example_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService", "OtherService"],
        )],
        ..Default::default()
    }
}

fn write_config(dir: &TempDir, config: &str) -> PathBuf {
    let config_dir = dir.path().join("einride/example/v1");
    fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join("example_grpc_service_config.json");
    fs::write(&path, config).unwrap();
    path
}

fn is_listening(addr: SocketAddr) -> bool {
    TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_ok()
}

#[test]
fn test_shared_config_is_validated_and_embedded_once() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, CONFIG);

    let response = driver::handle_request(request(&dir, "validate=true,required=true"));

    assert_eq!(response.error, None);
    assert_eq!(response.file.len(), 1);

    let file = &response.file[0];
    assert_eq!(file.name(), OUTPUT_NAME);

    let source = fs::read_to_string(&config_path).unwrap();
    let content = file.content();
    assert!(content.contains("package examplev1\n"));
    assert!(content.contains(&format!("const ServiceConfig = `{}`", source)));
}

#[test]
fn test_missing_required_config_names_service() {
    let dir = TempDir::new().unwrap();

    let response = driver::handle_request(request(&dir, "required=true"));

    let error = response.error.expect("run fails");
    assert!(error.contains("einride.example.v1.ExampleService"), "error: {}", error);
    assert!(error.contains("example_grpc_service_config.json"));
    assert!(response.file.is_empty());
}

#[test]
fn test_missing_optional_config_generates_nothing() {
    let dir = TempDir::new().unwrap();

    let response = driver::handle_request(request(&dir, "validate=true"));

    assert_eq!(response.error, None);
    assert!(response.file.is_empty());
}

#[test]
fn test_malformed_config_aborts_run() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, r#"{"methodConfig": [{"name": [{}]"#);

    let emitted = driver::handle_request(request(&dir, ""));
    let error = emitted.error.expect("emission rejects malformed JSON");
    assert!(error.starts_with("run: invalid service config file"), "error: {}", error);
    assert!(emitted.file.is_empty());

    let validated = driver::handle_request(request(&dir, "validate=true"));
    let error = validated.error.expect("dial rejects malformed JSON");
    assert!(error.starts_with("validate: invalid service config"), "error: {}", error);
    assert!(validated.file.is_empty());
}

#[test]
fn test_error_stops_later_services() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, r#"{"methodConfig": [{"name": [{"service": "einride.example.v1.ExampleService"}]}]}"#);

    let plugin_request = PluginRequest::from(request(&dir, "validate=true,required=true"));
    let options = plugin_request.options().unwrap();
    let files = plugin_request.parse(&options).unwrap();

    match driver::generate(&files, &options) {
        Err(PluginError::ConfigNotApplicable { service, path }) => {
            assert_eq!(service, "einride.example.v1.OtherService");
            assert!(path.ends_with("einride/example/v1/example_grpc_service_config.json"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_capitalized_keys_do_not_widen_required_config() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"{"MethodConfig": [{"Name": [{"Service": "einride.example.v1.ExampleService"}]}]}"#,
    );

    let response = driver::handle_request(request(&dir, "validate=true,required=true"));

    let error = response.error.expect("OtherService is not covered");
    assert!(error.contains("einride.example.v1.OtherService"), "error: {}", error);
    assert!(response.file.is_empty());
}

#[test]
fn test_dial_server_is_stopped_after_success_and_failure() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    let options = PluginOptions {
        path: dir.path().to_path_buf(),
        validate: true,
        required: true,
        ..Default::default()
    };
    let files = PluginRequest::from(request(&dir, ""))
        .parse(&options)
        .unwrap();

    let mut checker = OnDemandDialChecker::new();
    assert_eq!(driver::generate_with(&files, &options, &mut checker).unwrap().len(), 1);
    let addr = checker.local_addr().expect("server started for validation");
    checker.shutdown().unwrap();
    assert!(!is_listening(addr));

    write_config(&dir, r#"{"loadBalancingConfig": [{"unknown_policy": {}}]}"#);
    let mut checker = OnDemandDialChecker::new();
    assert!(driver::generate_with(&files, &options, &mut checker).is_err());
    let addr = checker.local_addr().expect("server started for validation");
    checker.shutdown().unwrap();
    assert!(!is_listening(addr));
}

#[test]
fn test_plugin_binary_round_trip() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);

    let mut child = Command::new(env!("CARGO_BIN_EXE_protoc-gen-go-grpc-service-config"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(&request(&dir, "validate=true").encode_to_vec())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let response = CodeGeneratorResponse::decode(output.stdout.as_slice()).unwrap();
    assert_eq!(response.error, None);
    assert_eq!(response.file.len(), 1);
    assert_eq!(response.file[0].name(), OUTPUT_NAME);
}

#[test]
fn test_standalone_writes_files() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    let out = TempDir::new().unwrap();

    let descriptor_set = dir.path().join("descriptor.pb");
    let set = prost_types::FileDescriptorSet {
        file: vec![example_file(
            "einride/example/v1/example_service.proto",
            &["ExampleService"],
        )],
    };
    fs::write(&descriptor_set, set.encode_to_vec()).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_protoc-gen-go-grpc-service-config"))
        .arg("--descriptor-set-in")
        .arg(&descriptor_set)
        .arg("--param")
        .arg(format!("path={},paths=source_relative", dir.path().display()))
        .arg("--out")
        .arg(out.path())
        .stdout(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());

    let generated = out
        .path()
        .join(Path::new("einride/example/v1/example_grpc_service_config.json.go"));
    let content = fs::read_to_string(generated).unwrap();
    assert!(content.contains("// source: einride/example/v1/example_service.proto"));
}
