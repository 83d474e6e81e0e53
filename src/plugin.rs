use std::fmt::{Display, Formatter};

/// The plugin controllers the validator can be deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Aws,
    Azure,
    Network,
    Oci,
    Vsphere,
    Maas,
}

impl PluginKind {
    /// Declaration order. Secrets, chart values and readiness waits follow it.
    pub const ALL: [PluginKind; 6] = [
        PluginKind::Aws,
        PluginKind::Azure,
        PluginKind::Network,
        PluginKind::Oci,
        PluginKind::Vsphere,
        PluginKind::Maas,
    ];

    /// Order in which rule manifests are applied.
    pub const RULE_APPLY_ORDER: [PluginKind; 6] = [
        PluginKind::Aws,
        PluginKind::Vsphere,
        PluginKind::Network,
        PluginKind::Oci,
        PluginKind::Azure,
        PluginKind::Maas,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PluginKind::Aws => "aws",
            PluginKind::Azure => "azure",
            PluginKind::Network => "network",
            PluginKind::Oci => "oci",
            PluginKind::Vsphere => "vsphere",
            PluginKind::Maas => "maas",
        }
    }

    /// Helm chart and release name of the plugin, e.g. `validator-plugin-oci`.
    pub fn chart_name(&self) -> String {
        format!("validator-plugin-{}", self.id())
    }

    pub fn controller_deployment(&self) -> String {
        format!("validator-plugin-{}-controller-manager", self.id())
    }

    /// Name of the custom resource created from the plugin's rules.
    pub fn resource_name(&self) -> String {
        format!("validator-plugin-{}-rules", self.id())
    }

    pub fn rules_template(&self) -> &'static str {
        match self {
            PluginKind::Aws => "crs/aws.yaml",
            PluginKind::Azure => "crs/azure.yaml",
            PluginKind::Network => "crs/network.yaml",
            PluginKind::Oci => "crs/oci.yaml",
            PluginKind::Vsphere => "crs/vsphere.yaml",
            PluginKind::Maas => "crs/maas.yaml",
        }
    }
}

impl Display for PluginKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.chart_name())
    }
}

#[cfg(test)]
mod tests {
    use super::PluginKind;

    #[test]
    fn orders_cover_every_plugin_once() {
        for order in [PluginKind::ALL, PluginKind::RULE_APPLY_ORDER] {
            for kind in PluginKind::ALL {
                assert_eq!(order.iter().filter(|k| **k == kind).count(), 1, "{kind}");
            }
        }
    }

    #[test]
    fn names() {
        assert_eq!(PluginKind::Oci.chart_name(), "validator-plugin-oci");
        assert_eq!(
            PluginKind::Vsphere.controller_deployment(),
            "validator-plugin-vsphere-controller-manager"
        );
        assert_eq!(PluginKind::Aws.to_string(), "validator-plugin-aws");
    }
}
