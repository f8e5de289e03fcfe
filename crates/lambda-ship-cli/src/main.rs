//! Lambda Ship CLI - Command-line interface for function deployments
//!
//! This CLI provides tools for:
//! - Packaging function code keyed by commit
//! - Deploying packages and repointing the active alias
//! - Announcing deployments to the DRI channel

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{deploy, package, targets, version};
use lambda_ship_core::{handle_error, DeployContext, ShellRunner, ShipError};

#[derive(Parser)]
#[command(name = "lambda-ship")]
#[command(author = "Lambda Ship Team")]
#[command(version)]
#[command(about = "Lambda Ship - package, deploy and announce function releases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project file, relative to the repository root (default: deploy.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the package of every target for the current commit
    Package(package::PackageCommand),

    /// Package, then deploy every target
    Deploy(deploy::DeployCommand),

    /// List configured deployment targets
    Targets(targets::TargetsCommand),

    /// Show version information
    Version(version::VersionCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Some(Commands::Version(cmd)) => return cmd.execute(),
        Some(command) => command,
        None => {
            // Show help by default
            println!("{}", "Lambda Ship".bold());
            println!();
            println!("Run {} for usage", "lambda-ship --help".cyan());
            return Ok(());
        }
    };

    let runner = ShellRunner;

    // Resolve repository and configuration once for the whole run
    let ctx = match DeployContext::load(&runner, cli.config.as_deref()).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{} Failed to load configuration", "✗".red());
            handle_error(&e);
            std::process::exit(1);
        }
    };

    tracing::debug!(
        commit = %ctx.commit(),
        root = %ctx.project_dir().display(),
        targets = ctx.config.targets().len(),
        "Resolved repository"
    );

    // Execute command
    let result = match command {
        Commands::Package(cmd) => cmd.execute(&ctx, &runner, cli.json).await,
        Commands::Deploy(cmd) => cmd.execute(&ctx, &runner, cli.json).await,
        Commands::Targets(cmd) => cmd.execute(&ctx, &runner, cli.json),
        Commands::Version(cmd) => cmd.execute(),
    };

    if let Err(e) = result {
        match e.downcast::<ShipError>() {
            Ok(error) => handle_error(&error),
            Err(other) => handle_error(&other.into()),
        }
        std::process::exit(1);
    }

    Ok(())
}
