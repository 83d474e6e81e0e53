use crate::exec::{self, CommandRunner, Toolbox};
use crate::plugin::PluginKind;
use crate::render::{self, indent, Renderer};
use crate::spec::{DeploymentSpec, EnabledPlugin, IamBindingKind, IamRoleBinding};
use crate::NAMESPACE;
use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tera::Context;
use thiserror::Error;

/// Nesting of `spec:` contents in the rule templates.
const SPEC_INDENT: usize = 2;

/// Template for each kind of AWS IAM role binding.
const IAM_BINDING_TEMPLATES: &[(IamBindingKind, &str)] = &[
    (IamBindingKind::Irsa, "crs/aws-irsa.yaml"),
    (IamBindingKind::PodIdentity, "crs/aws-pod-identity.yaml"),
];

#[derive(Error, Debug)]
pub enum Error {
    #[error("{plugin}: serialize rules: {err}")]
    Serialize {
        plugin: PluginKind,
        err: serde_yaml::Error,
    },

    #[error("{plugin}: {err}")]
    Render {
        plugin: PluginKind,
        err: render::Error,
    },

    #[error("{plugin}: no template for IAM role binding {kind:?}")]
    NoTemplate {
        plugin: PluginKind,
        kind: IamBindingKind,
    },

    #[error("{plugin}: kubectl apply: {err}")]
    Apply {
        plugin: PluginKind,
        err: exec::Error,
    },
}

pub fn manifest_path(manifest_dir: &Path, name: &str) -> PathBuf {
    manifest_dir.join(format!("{name}.yaml"))
}

/// Render the custom resource holding a plugin's rules.
pub fn render_rules(renderer: &dyn Renderer, plugin: &EnabledPlugin) -> Result<Vec<u8>, Error> {
    let rules = plugin.rules.to_yaml().map_err(|err| Error::Serialize {
        plugin: plugin.kind,
        err,
    })?;
    let mut args = Context::new();
    args.insert("name", &plugin.kind.resource_name());
    args.insert("namespace", NAMESPACE);
    args.insert("spec", &indent(&rules, SPEC_INDENT));
    renderer
        .render(plugin.kind.rules_template(), &args)
        .map_err(|err| Error::Render {
            plugin: plugin.kind,
            err,
        })
}

#[derive(Serialize)]
struct IamAuthArgs<'a> {
    account_id: &'a str,
    service_account: &'a str,
    cluster_name: &'a str,
}

fn render_iam_binding(renderer: &dyn Renderer, binding: &IamRoleBinding) -> Result<Vec<u8>, Error> {
    let plugin = PluginKind::Aws;
    let template = IAM_BINDING_TEMPLATES
        .iter()
        .find(|(kind, _)| *kind == binding.kind)
        .map(|(_, template)| *template)
        .ok_or(Error::NoTemplate {
            plugin,
            kind: binding.kind,
        })?;

    let mut args = Context::new();
    args.insert("name", &format!("{}-iam", plugin.chart_name()));
    args.insert("namespace", NAMESPACE);
    args.insert("role_name", &binding.role_name);
    args.insert(
        "auth",
        &IamAuthArgs {
            account_id: &binding.account_id,
            service_account: &binding.service_account,
            cluster_name: &binding.cluster_name,
        },
    );
    renderer
        .render(template, &args)
        .map_err(|err| Error::Render { plugin, err })
}

fn write_and_apply(
    toolbox: &Toolbox,
    runner: &dyn CommandRunner,
    plugin: PluginKind,
    path: &Path,
    manifest: &[u8],
) -> Result<(), Error> {
    render::write(path, manifest).map_err(|err| Error::Render { plugin, err })?;
    info!("Applying {}", path.display());
    runner
        .run(&toolbox.kubectl(["apply".to_string(), "-f".to_string(), path.display().to_string()]))
        .map_err(|err| Error::Apply { plugin, err })?;
    Ok(())
}

/// Render, write and apply one rules manifest per enabled plugin with rules,
/// in rule-apply order. Returns the applied manifest paths.
pub fn apply_rules(
    toolbox: &Toolbox,
    runner: &dyn CommandRunner,
    renderer: &dyn Renderer,
    spec: &DeploymentSpec,
    manifest_dir: &Path,
) -> Result<Vec<PathBuf>, Error> {
    let mut applied = vec![];
    for kind in PluginKind::RULE_APPLY_ORDER {
        let Some(plugin) = spec.plugin(kind) else {
            continue;
        };

        if plugin.rules.rule_count() > 0 {
            let path = manifest_path(manifest_dir, &kind.chart_name());
            let manifest = render_rules(renderer, &plugin)?;
            write_and_apply(toolbox, runner, kind, &path, &manifest)?;
            applied.push(path);
        } else {
            debug!("{kind} has no rules configured");
        }

        if kind == PluginKind::Aws {
            if let Some(binding) = spec.iam_role_binding() {
                let path = manifest_path(manifest_dir, &format!("{}-iam", kind.chart_name()));
                let manifest = render_iam_binding(renderer, binding)?;
                write_and_apply(toolbox, runner, kind, &path, &manifest)?;
                applied.push(path);
            }
        }
    }
    Ok(applied)
}
