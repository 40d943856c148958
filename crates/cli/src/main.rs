//! protoc-gen-go-grpc-service-config CLI
//!
//! Runs as a protoc plugin when started without arguments. With
//! `--descriptor-set-in` it runs standalone against a FileDescriptorSet and
//! writes the generated files itself.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use grpc_service_config_parser::PluginRequest;
use prost::Message;
use protoc_gen_go_grpc_service_config::{driver, logging};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "protoc-gen-go-grpc-service-config")]
#[command(
    version,
    about = "Embed gRPC service configs into generated Go packages",
    long_about = None
)]
#[command(after_help = "EXAMPLES:\n  \
    # As a protoc plugin\n  \
    protoc --go-grpc-service-config_out=gen \\\n    \
    --go-grpc-service-config_opt=path=proto,validate=true,required=true \\\n    \
    einride/example/v1/example_service.proto\n\n  \
    # Standalone, from a descriptor set\n  \
    protoc-gen-go-grpc-service-config \\\n    \
    --descriptor-set-in descriptor.pb \\\n    \
    --file einride/example/v1/example_service.proto \\\n    \
    --param path=proto,validate=true \\\n    \
    --out gen")]
struct Cli {
    /// FileDescriptorSet to read instead of a protoc request on stdin
    #[arg(long)]
    descriptor_set_in: Option<PathBuf>,

    /// Comma-separated list of proto files to generate (default: all files in the set)
    #[arg(long, value_delimiter = ',', requires = "descriptor_set_in")]
    file: Vec<String>,

    /// Plugin parameter string, as passed by protoc
    #[arg(long, default_value = "", requires = "descriptor_set_in")]
    param: String,

    /// Output directory
    #[arg(short, long, default_value = ".", requires = "descriptor_set_in")]
    out: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match &cli.descriptor_set_in {
        Some(descriptor_set) => standalone_command(&cli, descriptor_set),
        None => plugin_command(),
    }
}

/// Answer the protoc request on stdin
fn plugin_command() -> Result<()> {
    let request =
        PluginRequest::from_reader(io::stdin().lock()).context("Failed to read request")?;
    debug!(files = ?request.files_to_generate(), "received protoc request");

    let response = driver::handle_request(request);

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&response.encode_to_vec())
        .context("Failed to write response")?;
    stdout.flush().context("Failed to write response")?;

    Ok(())
}

fn standalone_command(cli: &Cli, descriptor_set: &Path) -> Result<()> {
    println!(
        "{} Reading descriptor set: {}",
        "→".cyan(),
        descriptor_set.display()
    );

    let request =
        PluginRequest::from_descriptor_set_file(descriptor_set, &cli.file, &cli.param)
            .context("Failed to load FileDescriptorSet")?;

    if cli.verbose {
        println!("  Files: {}", request.files_to_generate().join(", "));
        println!("  Parameter: {}", request.parameter());
        println!("  Output: {}", cli.out.display());
    }

    println!("{} Resolving service configs...", "→".cyan());
    let files = driver::run(request).context("Generation failed")?;

    for file in &files {
        let path = cli.out.join(&file.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, &file.content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!("\n{}", "✓ Generation complete!".green().bold());
    if files.is_empty() {
        println!("  No service configs found");
    } else {
        println!("\n{}", "Generated files:".bold());
        for file in &files {
            println!("  📄 {}", cli.out.join(&file.name).display());
        }
    }

    Ok(())
}
