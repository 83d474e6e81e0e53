use crate::exec::{self, Command, CommandRunner, Toolbox};
use crate::plugin::PluginKind;
use crate::spec::EnabledPlugin;
use crate::NAMESPACE;
use log::info;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("{plugin} did not become ready: {err}")]
pub struct Error {
    pub plugin: PluginKind,
    pub err: exec::Error,
}

/// The wait registered for a plugin: its controller deployment becoming available.
pub fn wait_command(toolbox: &Toolbox, kind: PluginKind) -> Command {
    toolbox.kubectl([
        "wait".to_string(),
        "--for=condition=available".to_string(),
        format!("--timeout={}s", toolbox.settings().wait.plugin_timeout_secs),
        format!("deployment/{}", kind.controller_deployment()),
        "-n".to_string(),
        NAMESPACE.to_string(),
    ])
}

/// Wait for each plugin controller in turn, stopping at the first that
/// never becomes ready.
///
/// Plugin controllers compete for the API server while they start, so the
/// waits run one after another rather than concurrently.
pub fn wait_for_plugins(
    toolbox: &Toolbox,
    runner: &dyn CommandRunner,
    plugins: &[EnabledPlugin],
) -> Result<(), Error> {
    for plugin in plugins {
        info!("Waiting for {} to become ready", plugin.kind);
        runner
            .run(&wait_command(toolbox, plugin.kind))
            .map_err(|err| Error {
                plugin: plugin.kind,
                err,
            })?;
    }
    Ok(())
}
