//! Rule sets for each plugin, serialized in the shape of the plugin's
//! custom resource `spec`.
//!
//! Rule names are assumed unique within a set; they are assigned and checked
//! when the configuration is collected.

use serde::{Deserialize, Serialize};

/// A plugin's ordered collection of rules.
pub trait RuleSet {
    fn rule_count(&self) -> usize;

    fn to_yaml(&self) -> Result<String, serde_yaml::Error>;
}

macro_rules! rule_set {
    ($ty:ty, $($list:ident),+) => {
        impl RuleSet for $ty {
            fn rule_count(&self) -> usize {
                0 $(+ self.$list.len())+
            }

            fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
                serde_yaml::to_string(self)
            }
        }
    };
}

/// Reference to a secret in the validator namespace.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub secret_name: String,
}

// AWS

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsRules {
    #[serde(default)]
    pub default_region: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iam_role_rules: Vec<IamRoleRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iam_user_rules: Vec<IamUserRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iam_group_rules: Vec<IamGroupRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iam_policy_rules: Vec<IamPolicyRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_quota_rules: Vec<ServiceQuotaRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_rules: Vec<AwsTagRule>,
}

rule_set!(
    AwsRules,
    iam_role_rules,
    iam_user_rules,
    iam_group_rules,
    iam_policy_rules,
    service_quota_rules,
    tag_rules
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub name: String,
    pub version: String,
    pub statements: Vec<PolicyStatement>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatement {
    pub effect: String,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IamRoleRule {
    pub name: String,
    pub iam_role_name: String,
    pub iam_policies: Vec<PolicyDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IamUserRule {
    pub name: String,
    pub iam_user_name: String,
    pub iam_policies: Vec<PolicyDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IamGroupRule {
    pub name: String,
    pub iam_group_name: String,
    pub iam_policies: Vec<PolicyDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IamPolicyRule {
    pub name: String,
    pub iam_policy_arn: String,
    pub iam_policies: Vec<PolicyDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceQuotaRule {
    pub name: String,
    pub region: String,
    pub service_code: String,
    pub service_quotas: Vec<ServiceQuota>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceQuota {
    pub name: String,
    pub buffer: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsTagRule {
    pub name: String,
    pub key: String,
    pub expected_value: String,
    pub region: String,
    pub resource_type: String,
    pub arns: Vec<String>,
}

// Azure

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureRules {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rbac_rules: Vec<RbacRule>,
}

rule_set!(AzureRules, rbac_rules);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RbacRule {
    pub name: String,
    pub principal_id: String,
    pub permissions: Vec<PermissionSet>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    pub scope: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_actions: Vec<String>,
}

// Network

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRules {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_rules: Vec<DnsRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icmp_rules: Vec<IcmpRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_range_rules: Vec<IpRangeRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mtu_rules: Vec<MtuRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tcp_conn_rules: Vec<TcpConnRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_file_rules: Vec<HttpFileRule>,
}

rule_set!(
    NetworkRules,
    dns_rules,
    icmp_rules,
    ip_range_rules,
    mtu_rules,
    tcp_conn_rules,
    http_file_rules
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsRule {
    pub name: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IcmpRule {
    pub name: String,
    pub host: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpRangeRule {
    pub name: String,
    #[serde(rename = "startIP")]
    pub start_ip: String,
    pub length: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MtuRule {
    pub name: String,
    pub host: String,
    #[serde(rename = "minimumMTU")]
    pub minimum_mtu: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TcpConnRule {
    pub name: String,
    pub hosts: Vec<String>,
    pub ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpFileRule {
    pub name: String,
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<SecretRef>,
}

// OCI registry

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OciRules {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub oci_registry_rules: Vec<OciRegistryRule>,
}

rule_set!(OciRules, oci_registry_rules);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OciRegistryRule {
    pub name: String,
    pub host: String,
    pub artifacts: Vec<Artifact>,
    #[serde(rename = "insecureSkipTLSVerify", default)]
    pub insecure_skip_tls_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<SecretRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_verification: Option<SignatureVerification>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_validation: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureVerification {
    pub provider: String,
    pub secret_name: String,
}

// vSphere

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VsphereRules {
    #[serde(default)]
    pub auth: SecretRef,
    #[serde(default)]
    pub datacenter: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compute_resource_rules: Vec<ComputeResourceRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_privilege_validation_rules: Vec<EntityPrivilegeRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_privilege_validation_rules: Vec<RolePrivilegeRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ntp_validation_rules: Vec<NtpRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_validation_rules: Vec<VsphereTagRule>,
}

rule_set!(
    VsphereRules,
    compute_resource_rules,
    entity_privilege_validation_rules,
    role_privilege_validation_rules,
    ntp_validation_rules,
    tag_validation_rules
);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResourceRule {
    pub name: String,
    pub cluster_name: String,
    pub scope: String,
    pub entity_name: String,
    pub nodepool_resource_requirements: Vec<NodepoolResourceRequirement>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodepoolResourceRequirement {
    pub name: String,
    pub number_of_nodes: u32,
    pub cpu: String,
    pub memory: String,
    pub disk_space: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityPrivilegeRule {
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
    pub entity_type: String,
    pub entity_name: String,
    pub privileges: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RolePrivilegeRule {
    pub name: String,
    pub username: String,
    pub privileges: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NtpRule {
    pub name: String,
    pub cluster_name: String,
    pub hosts: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VsphereTagRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
    pub entity_type: String,
    pub entity_name: String,
    pub tag: String,
}

// MAAS

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaasRules {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub auth: SecretRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_rules: Vec<MaasImageRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_rules: Vec<MaasResourceRule>,
    #[serde(rename = "upstreamDNSRules", default, skip_serializing_if = "Vec::is_empty")]
    pub upstream_dns_rules: Vec<UpstreamDnsRule>,
}

rule_set!(MaasRules, image_rules, resource_rules, upstream_dns_rules);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaasImageRule {
    pub name: String,
    pub images: Vec<MaasImage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaasImage {
    pub name: String,
    pub architecture: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaasResourceRule {
    pub name: String,
    pub resources: Vec<MaasResource>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MaasResource {
    #[serde(rename = "az")]
    pub availability_zone: String,
    #[serde(rename = "numMachines")]
    pub machines: u32,
    #[serde(rename = "numCPU")]
    pub cpu: u32,
    #[serde(rename = "ram")]
    pub ram_gb: u32,
    #[serde(rename = "disk")]
    pub disk_gb: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamDnsRule {
    pub name: String,
    #[serde(rename = "numDNSServers")]
    pub dns_servers: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oci_rules_use_crd_field_names() {
        let rules = OciRules {
            oci_registry_rules: vec![OciRegistryRule {
                name: "public images".into(),
                host: "registry.example".into(),
                artifacts: vec![Artifact {
                    reference: "library/alpine:3".into(),
                    layer_validation: None,
                }],
                insecure_skip_tls_verify: true,
                ca_cert: None,
                auth: None,
                signature_verification: None,
            }],
        };
        let yaml = rules.to_yaml().unwrap();
        assert!(yaml.starts_with("ociRegistryRules:\n"));
        assert!(yaml.contains("- ref: library/alpine:3"));
        assert!(yaml.contains("insecureSkipTLSVerify: true"));
        assert!(!yaml.contains("caCert"));
        assert_eq!(rules.rule_count(), 1);
    }

    #[test]
    fn empty_rule_lists_are_omitted() {
        let rules = NetworkRules {
            icmp_rules: vec![IcmpRule {
                name: "gateway".into(),
                host: "10.0.0.1".into(),
            }],
            ..Default::default()
        };
        let yaml = rules.to_yaml().unwrap();
        assert_eq!(yaml, "icmpRules:\n- name: gateway\n  host: 10.0.0.1\n");
        assert_eq!(rules.rule_count(), 1);
        assert_eq!(AwsRules::default().rule_count(), 0);
    }

    #[test]
    fn maas_rules_parse_from_config() {
        let rules: MaasRules = serde_yaml::from_str(
            r#"
host: http://maas.example:5240/MAAS
auth:
  secretName: maas-creds
resourceRules:
- name: az1 capacity
  resources:
  - az: az1
    numMachines: 3
    numCPU: 4
    ram: 16
    disk: 100
upstreamDNSRules:
- name: upstream
  numDNSServers: 1
"#,
        )
        .unwrap();
        assert_eq!(rules.rule_count(), 2);
        assert_eq!(rules.resource_rules[0].resources[0].machines, 3);
        assert_eq!(rules.auth.secret_name, "maas-creds");
    }
}
