//! Installs the validator controller and its plugins into a Kubernetes
//! cluster, then applies each plugin's rules.
//!
//! The deployment is one synchronous sequence of external commands:
//!
//! 1. provision the kind cluster, when requested
//! 2. create plugin credential secrets
//! 3. `helm upgrade --install` the validator chart (pulling it first for OCI repositories)
//! 4. wait for the validator controller, then for each plugin controller
//! 5. render and apply one rules manifest per plugin
//!
//! Each step is safe to re-run, so re-running install is the recovery path
//! for a deployment that stopped half way.

pub mod apply;
pub mod chart;
pub mod exec;
pub mod kind;
pub mod orchestrator;
pub mod plugin;
pub mod readiness;
pub mod release;
pub mod render;
pub mod ruleset;
pub mod secrets;
pub mod settings;
pub mod spec;

#[cfg(test)]
mod testing;

/// Namespace everything is installed into.
pub const NAMESPACE: &str = "validator";

/// Helm release name of the validator chart.
pub const RELEASE_NAME: &str = "validator";
