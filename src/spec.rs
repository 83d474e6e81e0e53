use crate::plugin::PluginKind;
use crate::ruleset::{AwsRules, AzureRules, MaasRules, NetworkRules, OciRules, RuleSet, VsphereRules};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {path}: {err}")]
    ReadFile {
        err: std::io::Error,
        path: String,
    },

    #[error("deserialize: {0}")]
    Deserialize(#[from] serde_yaml::Error),

    #[error("no plugins are enabled")]
    NoPluginsEnabled,

    #[error("missing {0}")]
    Missing(String),
}

/// Fully resolved description of a validator deployment.
///
/// Built upstream (interactively or from a file) and only ever read by the
/// deployment steps.
#[serde_inline_default]
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    pub kubeconfig: PathBuf,
    #[serde(default)]
    pub kind_cluster: Option<KindCluster>,
    /// The validator chart itself.
    pub release: ChartRef,
    #[serde_inline_default(DEFAULT_IMAGE_REGISTRY.to_string())]
    pub image_registry: String,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub sink: Option<SinkConfig>,

    #[serde(default)]
    pub aws: Option<AwsPluginSpec>,
    #[serde(default)]
    pub azure: Option<PluginSpec<AzureRules>>,
    #[serde(default)]
    pub network: Option<PluginSpec<NetworkRules>>,
    #[serde(default)]
    pub oci: Option<PluginSpec<OciRules>>,
    #[serde(default)]
    pub vsphere: Option<PluginSpec<VsphereRules>>,
    #[serde(default)]
    pub maas: Option<PluginSpec<MaasRules>>,
}

pub const DEFAULT_IMAGE_REGISTRY: &str = "quay.io/validator-labs";

/// A local kind cluster used as the deployment target.
#[serde_inline_default]
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct KindCluster {
    #[serde_inline_default("validator-kind-cluster".to_string())]
    pub name: String,
    /// Create the cluster on install and delete it on uninstall.
    #[serde(default)]
    pub provision: bool,
}

/// Where a Helm chart comes from.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    pub name: String,
    /// HTTP(S) chart repository, or an `oci://` registry path.
    pub repository: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub https_proxy: String,
    #[serde(default)]
    pub no_proxy: String,
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum SinkType {
    Alertmanager,
    Slack,
}

/// Where validation results are reported, besides the cluster itself.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SinkConfig {
    #[serde(rename = "type")]
    pub sink_type: SinkType,
    pub secret_name: String,
}

/// Credentials a plugin controller reads from a cluster secret.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretDescriptor {
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
    /// The secret is managed outside of this tool.
    #[serde(default)]
    pub exists: bool,
}

impl SecretDescriptor {
    pub fn should_create(&self) -> bool {
        !self.exists
            && (!self.username.is_empty() || !self.password.is_empty() || self.ca_cert_path.is_some())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec<R> {
    #[serde(default)]
    pub enabled: bool,
    pub chart: ChartRef,
    #[serde(default)]
    pub secret: Option<SecretDescriptor>,
    pub rules: R,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AwsPluginSpec {
    #[serde(flatten)]
    pub plugin: PluginSpec<AwsRules>,
    #[serde(default)]
    pub iam_role_binding: Option<IamRoleBinding>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IamBindingKind {
    /// IAM role for a service account, via the EKS role-arn annotation.
    Irsa,
    /// EKS pod identity association managed by the ACK EKS controller.
    PodIdentity,
}

/// Binds the AWS plugin's service account to an IAM role instead of
/// static credentials.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IamRoleBinding {
    pub kind: IamBindingKind,
    pub role_name: String,
    pub account_id: String,
    pub service_account: String,
    #[serde(default)]
    pub cluster_name: String,
}

/// A plugin that is enabled in a [`DeploymentSpec`], with its rules type erased.
pub struct EnabledPlugin<'a> {
    pub kind: PluginKind,
    pub chart: &'a ChartRef,
    pub secret: Option<&'a SecretDescriptor>,
    pub rules: &'a dyn RuleSet,
}

impl<'a> EnabledPlugin<'a> {
    fn from_spec<R: RuleSet>(kind: PluginKind, spec: &'a PluginSpec<R>) -> Option<Self> {
        spec.enabled.then_some(Self {
            kind,
            chart: &spec.chart,
            secret: spec.secret.as_ref(),
            rules: &spec.rules,
        })
    }

    /// Secret name the plugin controller should read credentials from, if any.
    pub fn secret_name(&self) -> Option<&'a str> {
        self.secret
            .filter(|secret| secret.exists || secret.should_create())
            .map(|secret| secret.name.as_str())
    }
}

impl DeploymentSpec {
    pub fn parse(yaml_string: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml_string)?)
    }

    pub fn parse_file(path: &Path) -> Result<Self, Error> {
        Self::parse(&std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
            err,
            path: path.display().to_string(),
        })?)
    }

    /// Enabled plugins in declaration order.
    pub fn enabled_plugins(&self) -> Vec<EnabledPlugin<'_>> {
        PluginKind::ALL
            .into_iter()
            .filter_map(|kind| self.plugin(kind))
            .collect()
    }

    pub fn plugin(&self, kind: PluginKind) -> Option<EnabledPlugin<'_>> {
        match kind {
            PluginKind::Aws => self
                .aws
                .as_ref()
                .and_then(|aws| EnabledPlugin::from_spec(kind, &aws.plugin)),
            PluginKind::Azure => self.azure.as_ref().and_then(|s| EnabledPlugin::from_spec(kind, s)),
            PluginKind::Network => self.network.as_ref().and_then(|s| EnabledPlugin::from_spec(kind, s)),
            PluginKind::Oci => self.oci.as_ref().and_then(|s| EnabledPlugin::from_spec(kind, s)),
            PluginKind::Vsphere => self.vsphere.as_ref().and_then(|s| EnabledPlugin::from_spec(kind, s)),
            PluginKind::Maas => self.maas.as_ref().and_then(|s| EnabledPlugin::from_spec(kind, s)),
        }
    }

    /// IAM role binding of the AWS plugin, when that plugin is enabled.
    pub fn iam_role_binding(&self) -> Option<&IamRoleBinding> {
        self.aws
            .as_ref()
            .filter(|aws| aws.plugin.enabled)
            .and_then(|aws| aws.iam_role_binding.as_ref())
    }

    /// Checks everything that can be checked without touching the cluster.
    pub fn validate(&self) -> Result<(), Error> {
        if self.kubeconfig.as_os_str().is_empty() {
            return Err(Error::Missing("kubeconfig".into()));
        }
        require("release chart name", &self.release.name)?;
        require("release chart repository", &self.release.repository)?;
        require("release chart version", &self.release.version)?;

        let plugins = self.enabled_plugins();
        if plugins.is_empty() {
            return Err(Error::NoPluginsEnabled);
        }
        for plugin in plugins {
            require(&format!("{} chart name", plugin.kind), &plugin.chart.name)?;
            require(&format!("{} chart repository", plugin.kind), &plugin.chart.repository)?;
            if let Some(secret) = plugin.secret.filter(|s| s.should_create()) {
                require(&format!("{} secret name", plugin.kind), &secret.name)?;
            }
        }
        Ok(())
    }
}

fn require(what: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        Err(Error::Missing(what.to_string()))
    } else {
        Ok(())
    }
}
