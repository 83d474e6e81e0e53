//! Sequences a deployment and its teardown.
//!
//! An install moves through the [`Stage`]s in order. There is no rollback:
//! when a step fails, the error records the last stage that completed and
//! whatever was installed stays installed. Every step tolerates being
//! repeated, so running the install again is how a stopped deployment is
//! finished.

use crate::exec::{self, CommandRunner, Toolbox};
use crate::plugin::PluginKind;
use crate::release::{self, ReleaseOptions};
use crate::render::Renderer;
use crate::settings::Settings;
use crate::spec::{self, DeploymentSpec, KindCluster};
use crate::{apply, kind, readiness, secrets, NAMESPACE, RELEASE_NAME};
use log::{debug, info};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SecretsProvisioned,
    ReleaseInstalled,
    ControllerReady,
    PluginsReady,
    RulesApplied,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::SecretsProvisioned => "secrets provisioned",
            Stage::ReleaseInstalled => "release installed",
            Stage::ControllerReady => "controller ready",
            Stage::PluginsReady => "plugins ready",
            Stage::RulesApplied => "rules applied",
        })
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error("run directory {path}: {err}")]
    RunDir {
        err: std::io::Error,
        path: String,
    },

    #[error("kind cluster: {0}")]
    Kind(#[from] kind::Error),

    #[error("secrets: {0}")]
    Secrets(#[from] secrets::Error),

    #[error("release: {0}")]
    Release(#[from] release::Error),

    #[error("readiness: {0}")]
    Readiness(#[from] readiness::Error),

    #[error("rules: {0}")]
    Rules(#[from] apply::Error),

    #[error("helm uninstall: {0}")]
    Uninstall(exec::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid deployment: {0}")]
    Invalid(#[from] spec::Error),

    #[error("deployment stopped after stage '{completed}': {source}")]
    Aborted { completed: Stage, source: StepError },

    #[error("uninstall: {0}")]
    Teardown(StepError),
}

/// What a successful install put into the cluster.
#[derive(Debug, Clone)]
pub struct Summary {
    pub kubeconfig: PathBuf,
    pub plugins: Vec<PluginKind>,
    pub manifests: Vec<PathBuf>,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let plugins: Vec<String> = self.plugins.iter().map(ToString::to_string).collect();
        writeln!(f, "Installed {RELEASE_NAME} in namespace {NAMESPACE} with plugins: {}", plugins.join(", "))?;
        if !self.manifests.is_empty() {
            writeln!(f, "Applied rule manifests:")?;
            for manifest in &self.manifests {
                writeln!(f, "  {}", manifest.display())?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Validation results will appear shortly. Inspect them with:")?;
        writeln!(f, "  export KUBECONFIG={}", self.kubeconfig.display())?;
        writeln!(f, "  kubectl -n {NAMESPACE} get validationresults")?;
        write!(f, "  kubectl -n {NAMESPACE} describe validationresults")
    }
}

pub struct Orchestrator<'a> {
    runner: &'a dyn CommandRunner,
    renderer: &'a dyn Renderer,
    settings: &'a Settings,
    run_dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        renderer: &'a dyn Renderer,
        settings: &'a Settings,
        run_dir: &Path,
    ) -> Self {
        Self {
            runner,
            renderer,
            settings,
            run_dir: run_dir.to_path_buf(),
        }
    }

    /// Rendered manifests are written here, one file per plugin.
    pub fn manifest_dir(&self) -> PathBuf {
        self.run_dir.join("manifests")
    }

    /// Install or upgrade the validator and its plugins, then apply their rules.
    ///
    /// An invalid spec is rejected before any command runs.
    pub fn deploy(&self, spec: &DeploymentSpec) -> Result<Summary, Error> {
        spec.validate()?;

        let mut stage = Stage::Idle;
        match self.install_steps(spec, &mut stage) {
            Ok(summary) => Ok(summary),
            Err(source) => Err(Error::Aborted {
                completed: stage,
                source,
            }),
        }
    }

    fn install_steps(&self, spec: &DeploymentSpec, stage: &mut Stage) -> Result<Summary, StepError> {
        let toolbox = Toolbox::new(self.settings, &spec.kubeconfig);
        let plugins = spec.enabled_plugins();

        std::fs::create_dir_all(&self.run_dir).map_err(|err| StepError::RunDir {
            err,
            path: self.run_dir.display().to_string(),
        })?;

        if let Some(cluster) = provisioned_cluster(spec) {
            kind::ensure_cluster(&toolbox, self.runner, &cluster.name)?;
        }

        secrets::provision(&toolbox, self.runner, &plugins)?;
        advance(stage, Stage::SecretsProvisioned);

        let values = release::build_values(self.renderer, spec)?;
        release::install(&toolbox, self.runner, &self.run_dir, &ReleaseOptions::new(spec, values))?;
        advance(stage, Stage::ReleaseInstalled);

        release::wait_for_controller(&toolbox, self.runner)?;
        advance(stage, Stage::ControllerReady);

        readiness::wait_for_plugins(&toolbox, self.runner, &plugins)?;
        advance(stage, Stage::PluginsReady);

        let manifests = apply::apply_rules(&toolbox, self.runner, self.renderer, spec, &self.manifest_dir())?;
        advance(stage, Stage::RulesApplied);

        Ok(Summary {
            kubeconfig: spec.kubeconfig.clone(),
            plugins: plugins.iter().map(|plugin| plugin.kind).collect(),
            manifests,
        })
    }

    /// Remove the validator release, then the kind cluster if this tool provisions it.
    pub fn teardown(&self, spec: &DeploymentSpec) -> Result<(), Error> {
        let toolbox = Toolbox::new(self.settings, &spec.kubeconfig);

        info!("Uninstalling helm release {RELEASE_NAME}");
        match self.runner.run(&toolbox.helm(["uninstall", RELEASE_NAME, "-n", NAMESPACE])) {
            Ok(_) => {}
            Err(err) if exec::is_not_found(&err) => {
                debug!("release {RELEASE_NAME} is already gone: {err}");
            }
            Err(err) => return Err(Error::Teardown(StepError::Uninstall(err))),
        }

        if let Some(cluster) = provisioned_cluster(spec) {
            kind::delete_cluster(&toolbox, self.runner, &cluster.name)
                .map_err(|err| Error::Teardown(err.into()))?;
        }
        Ok(())
    }
}

fn provisioned_cluster(spec: &DeploymentSpec) -> Option<&KindCluster> {
    spec.kind_cluster.as_ref().filter(|cluster| cluster.provision)
}

fn advance(stage: &mut Stage, to: Stage) {
    info!("Stage: {to}");
    *stage = to;
}
