//! Keel - a declarative service provisioning compiler
//!
//! This is the CLI entry point for inspecting compiled service graphs.

use clap::{Parser, Subcommand};
use keel::assemble::{DeploymentContext, ServiceCompiler};
use keel::spec::SpecParser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Keel - service provisioning compiler
#[derive(Parser)]
#[command(name = "keel")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Compile declarative service specs into resource graphs", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a service spec without compiling it
    Validate {
        /// Spec file (service.yaml found in the current directory when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Compile a service spec and print the resource graph as JSON
    Compile {
        /// Spec file (service.yaml found in the current directory when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Deployment region for log configuration
        #[arg(short, long, default_value = "us-east-1")]
        region: String,
        /// Print the creation order instead of the full graph
        #[arg(long)]
        order: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Validate { file } => {
            let spec = SpecParser::load_file(&resolve_spec_file(file)?)?;
            keel::validate::Validator::validate(&spec)?;
            println!("spec is valid");
        }
        Commands::Compile {
            file,
            region,
            order,
        } => {
            let spec = SpecParser::load_file(&resolve_spec_file(file)?)?;
            let compiler = ServiceCompiler::new(DeploymentContext { region });
            let compiled = compiler.compile(&spec)?;

            if order {
                for id in compiled.graph.creation_order()? {
                    println!("{}", id);
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&compiled)?);
            }
        }
    }

    Ok(())
}

/// Use the given file, or probe the current directory for a default one
fn resolve_spec_file(file: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = file {
        return Ok(path);
    }

    let cwd = std::env::current_dir()?;
    SpecParser::find_spec_file(&cwd)
        .ok_or_else(|| anyhow::anyhow!("no spec file found in {}", cwd.display()))
}
