use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_SETTINGS: &str = include_str!("../default.toml");

/// Name of the settings file picked up implicitly from the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "vdeploy.toml";

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {path}: {err}")]
    ReadFile {
        err: std::io::Error,
        path: String,
    },

    #[error("parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A vdeploy.toml file.
///
/// Every key is optional in a user file; missing keys fall back to the
/// `default.toml` compiled into the program.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub tools: Tools,
    pub wait: Wait,
}

/// Binaries invoked for each external tool. Plain names are resolved through `PATH`.
#[serde_inline_default]
#[derive(Deserialize, Debug, Clone)]
pub struct Tools {
    #[serde_inline_default("helm".to_string())]
    pub helm: String,
    #[serde_inline_default("kubectl".to_string())]
    pub kubectl: String,
    #[serde_inline_default("kind".to_string())]
    pub kind: String,
    #[serde_inline_default("docker".to_string())]
    pub docker: String,
}

#[serde_inline_default]
#[derive(Deserialize, Debug, Clone)]
pub struct Wait {
    #[serde_inline_default(600)]
    pub controller_timeout_secs: u64,
    #[serde_inline_default(600)]
    pub plugin_timeout_secs: u64,
    /// Unconditional pause after the controller becomes available, giving it
    /// time to acquire its leader-election lease.
    #[serde_inline_default(20)]
    pub leader_election_grace_secs: u64,
}

impl Wait {
    pub fn leader_election_grace(&self) -> Duration {
        Duration::from_secs(self.leader_election_grace_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        // The default config is compiled into the program, so
        // make sure to test default() to catch panics compile-time.
        toml::from_str(DEFAULT_SETTINGS).unwrap()
    }
}

impl Settings {
    /// Overlay a user settings file on top of the built-in defaults.
    pub fn default_with_user_file(path: &Path) -> Result<Self, Error> {
        let user = std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
            err,
            path: path.display().to_string(),
        })?;
        Self::merged(&user)
    }

    fn merged(user: &str) -> Result<Self, Error> {
        let mut base: toml::Table = toml::from_str(DEFAULT_SETTINGS)?;
        let overlay: toml::Table = toml::from_str(user)?;
        merge(&mut base, overlay);
        Ok(toml::Value::Table(base).try_into()?)
    }
}

fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let toml::Value::Table(incoming) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            merge(existing, incoming);
            continue;
        }
        base.insert(key, toml::Value::Table(incoming));
    }
}
