use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use thiserror::Error;
use vdeploy::exec::SystemRunner;
use vdeploy::orchestrator::{self, Orchestrator};
use vdeploy::render::{self, TemplateRenderer};
use vdeploy::settings::{self, Settings, DEFAULT_SETTINGS_FILE};
use vdeploy::spec::{self, DeploymentSpec};

/// Deploy the validator and its plugins into a Kubernetes cluster.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a settings file. Defaults to ./vdeploy.toml when it exists.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory for rendered manifests and temporary chart files.
    /// Defaults to .vdeploy/run; each run overwrites the manifests of the last.
    #[arg(long)]
    run_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install or upgrade the validator and its plugins, then apply their rules.
    Install {
        /// Deployment configuration (YAML).
        #[arg(long)]
        config: PathBuf,
    },
    /// Uninstall the validator release, and delete the kind cluster if it was provisioned.
    Uninstall {
        /// Deployment configuration (YAML).
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("settings: {0}")]
    Settings(#[from] settings::Error),

    #[error("deployment configuration: {0}")]
    Spec(#[from] spec::Error),

    #[error("templates: {0}")]
    Templates(#[from] render::Error),

    #[error("{0}")]
    Orchestrator(#[from] orchestrator::Error),
}

/// Read the settings file and merge it with the built-in `default.toml`.
///
/// Without `--settings`, a `vdeploy.toml` in the working directory is used
/// if there is one.
fn read_settings(args: &Cli) -> Result<Settings, Error> {
    let settings_file = match &args.settings {
        Some(path) => Some(path.clone()),
        None => {
            let implicit = Path::new(DEFAULT_SETTINGS_FILE);
            std::fs::metadata(implicit)
                .map(|metadata| metadata.is_file())
                .unwrap_or(false)
                .then(|| implicit.to_path_buf())
        }
    };

    Ok(match settings_file {
        Some(path) => Settings::default_with_user_file(&path)?,
        None => Settings::default(),
    })
}

const DEFAULT_RUN_DIR: &str = ".vdeploy/run";

fn run_dir(args: &Cli) -> PathBuf {
    args.run_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RUN_DIR))
}

fn main() {
    match run() {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {}", err);
            std::process::exit(1)
        }
    }
}

fn run() -> Result<(), Error> {
    env_logger::init();

    let args = Cli::parse();
    let settings = read_settings(&args)?;
    let run_dir = run_dir(&args);
    let renderer = TemplateRenderer::from_embedded()?;
    let runner = SystemRunner;
    let orchestrator = Orchestrator::new(&runner, &renderer, &settings, &run_dir);

    match &args.command {
        Commands::Install { config } => {
            let spec = DeploymentSpec::parse_file(config)?;
            info!("Deploying to cluster at {}", spec.kubeconfig.display());
            info!("Run directory: {}", run_dir.display());
            let summary = orchestrator.deploy(&spec)?;
            println!("{summary}");
            Ok(())
        }
        Commands::Uninstall { config } => {
            let spec = DeploymentSpec::parse_file(config)?;
            orchestrator.teardown(&spec)?;
            info!("Validator uninstalled");
            Ok(())
        }
    }
}
