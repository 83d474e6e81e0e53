use crate::exec::{self, CommandRunner, Toolbox};
use log::info;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("docker is not reachable: {0}")]
    Docker(exec::Error),

    #[error("list kind clusters: {0}")]
    List(exec::Error),

    #[error("create kind cluster {name}: {err}")]
    Create { name: String, err: exec::Error },

    #[error("delete kind cluster {name}: {err}")]
    Delete { name: String, err: exec::Error },
}

/// Create the kind cluster `name` unless it already exists, writing its
/// kubeconfig to the toolbox kubeconfig path.
pub fn ensure_cluster(toolbox: &Toolbox, runner: &dyn CommandRunner, name: &str) -> Result<(), Error> {
    runner.run(&toolbox.docker(["info"])).map_err(Error::Docker)?;

    let clusters = runner
        .run(&toolbox.kind(["get", "clusters"]))
        .map_err(Error::List)?;
    if clusters.stdout.lines().any(|line| line.trim() == name) {
        info!("Using existing kind cluster {name}");
        return Ok(());
    }

    info!("Creating kind cluster {name}");
    runner
        .run(&toolbox.kind([
            "create".to_string(),
            "cluster".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--kubeconfig".to_string(),
            toolbox.kubeconfig().display().to_string(),
        ]))
        .map_err(|err| Error::Create {
            name: name.to_string(),
            err,
        })?;
    Ok(())
}

pub fn delete_cluster(toolbox: &Toolbox, runner: &dyn CommandRunner, name: &str) -> Result<(), Error> {
    info!("Deleting kind cluster {name}");
    runner
        .run(&toolbox.kind(["delete", "cluster", "--name", name]))
        .map_err(|err| Error::Delete {
            name: name.to_string(),
            err,
        })?;
    Ok(())
}
