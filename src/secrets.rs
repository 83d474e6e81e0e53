use crate::exec::{self, is_already_exists, Command, CommandRunner, Toolbox};
use crate::spec::{EnabledPlugin, SecretDescriptor};
use crate::NAMESPACE;
use log::{debug, info};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("look up namespace: {0}")]
    Namespace(exec::Error),

    #[error("{step}: {err}")]
    Step { step: String, err: exec::Error },
}

/// A command that must succeed before the helm release is installed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreReleaseStep {
    pub description: String,
    pub command: Command,
}

/// `kubectl create secret generic` for a plugin's credentials.
///
/// Both literals are always passed, even when empty: plugin controllers
/// refuse secrets that lack either key.
pub fn secret_command(toolbox: &Toolbox, secret: &SecretDescriptor) -> Command {
    let mut args = vec![
        "create".to_string(),
        "secret".to_string(),
        "generic".to_string(),
        secret.name.clone(),
        "-n".to_string(),
        NAMESPACE.to_string(),
        format!("--from-literal=username={}", secret.username),
        format!("--from-literal=password={}", secret.password),
    ];
    if let Some(ca_cert) = &secret.ca_cert_path {
        args.push(format!("--from-file=caCert={}", ca_cert.display()));
    }
    toolbox.kubectl(args)
}

fn namespace_exists(toolbox: &Toolbox, runner: &dyn CommandRunner) -> Result<bool, Error> {
    match runner.run(&toolbox.kubectl(["get", "namespace", NAMESPACE])) {
        Ok(_) => Ok(true),
        Err(err @ exec::Error::Failed { .. }) => {
            debug!("namespace {NAMESPACE} not found: {err}");
            Ok(false)
        }
        Err(err) => Err(Error::Namespace(err)),
    }
}

/// Commands creating the secrets of every plugin that needs one.
///
/// When there is anything to create and the namespace is missing, its
/// creation comes first.
pub fn pre_release_steps(
    toolbox: &Toolbox,
    runner: &dyn CommandRunner,
    plugins: &[EnabledPlugin],
) -> Result<Vec<PreReleaseStep>, Error> {
    let mut steps: Vec<PreReleaseStep> = plugins
        .iter()
        .filter_map(|plugin| plugin.secret.filter(|s| s.should_create()).map(|s| (plugin, s)))
        .map(|(plugin, secret)| PreReleaseStep {
            description: format!("create secret {} for {}", secret.name, plugin.kind),
            command: secret_command(toolbox, secret),
        })
        .collect();

    if steps.is_empty() {
        debug!("no plugin secrets to create");
        return Ok(steps);
    }

    if !namespace_exists(toolbox, runner)? {
        steps.insert(
            0,
            PreReleaseStep {
                description: format!("create namespace {NAMESPACE}"),
                command: toolbox.kubectl(["create", "namespace", NAMESPACE]),
            },
        );
    }
    Ok(steps)
}

/// Create plugin secrets ahead of the helm release. Safe to repeat.
pub fn provision(
    toolbox: &Toolbox,
    runner: &dyn CommandRunner,
    plugins: &[EnabledPlugin],
) -> Result<(), Error> {
    for step in pre_release_steps(toolbox, runner, plugins)? {
        info!("{}", step.description);
        match runner.run(&step.command) {
            Ok(_) => {}
            Err(err) if is_already_exists(&err) => {
                debug!("{}: already exists, continuing", step.description);
            }
            Err(err) => {
                return Err(Error::Step {
                    step: step.description,
                    err,
                })
            }
        }
    }
    Ok(())
}
