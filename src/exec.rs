use crate::settings::Settings;
use log::debug;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("`{command}` failed: {}", .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("could not start {program}: {err}")]
    Spawn {
        program: String,
        err: std::io::Error,
    },
}

impl Error {
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Error::Failed { stderr, .. } => Some(stderr),
            Error::Spawn { .. } => None,
        }
    }
}

/// Whether a failed create can be treated as success because the
/// object is already present in the cluster.
///
/// kubectl reports conflicts only through its stderr text, so this is a
/// case-sensitive suffix match on the trimmed output.
pub fn is_already_exists(err: &Error) -> bool {
    err.stderr()
        .map(|stderr| stderr.trim().ends_with("already exists"))
        .unwrap_or(false)
}

/// Whether a failed delete can be treated as success because the object is
/// already gone, e.g. helm's `release: not found`.
pub fn is_not_found(err: &Error) -> bool {
    err.stderr()
        .map(|stderr| stderr.trim().ends_with("not found"))
        .unwrap_or(false)
}

/// A single invocation of an external tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            env: vec![],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Value following `flag` in the argument list, e.g. `--values <path>`.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// Arguments whose value is joined to the flag and must not be shown.
const MASKED_PREFIXES: &[&str] = &["--from-literal=password=", "--password="];

/// Renders the command line with credentials masked.
impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                f.write_str(" ***")?;
                mask_next = false;
                continue;
            }
            match MASKED_PREFIXES.iter().find(|prefix| arg.starts_with(**prefix)) {
                Some(prefix) => write!(f, " {prefix}***")?,
                None => {
                    mask_next = arg == "--password";
                    write!(f, " {arg}")?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Executes external tools. Every step of a deployment goes through this seam.
pub trait CommandRunner {
    fn run(&self, command: &Command) -> Result<Output, Error>;
}

/// Runs commands as child processes of this one, blocking until they exit.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &Command) -> Result<Output, Error> {
        debug!("Running {command}");
        let output = std::process::Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .output()
            .map_err(|err| Error::Spawn {
                program: command.program.clone(),
                err,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if output.status.success() {
            Ok(Output { stdout, stderr })
        } else {
            Err(Error::Failed {
                command: command.to_string(),
                code: output.status.code(),
                stderr,
            })
        }
    }
}

/// Builds tool invocations bound to one target cluster.
///
/// Every kubectl and helm call carries the kubeconfig both as the
/// `KUBECONFIG` environment variable and as an explicit flag.
#[derive(Debug, Clone)]
pub struct Toolbox<'a> {
    settings: &'a Settings,
    kubeconfig: PathBuf,
}

impl<'a> Toolbox<'a> {
    pub fn new(settings: &'a Settings, kubeconfig: &Path) -> Self {
        Self {
            settings,
            kubeconfig: kubeconfig.to_path_buf(),
        }
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    fn cluster_scoped(&self, program: &str, args: Vec<String>) -> Command {
        let kubeconfig = self.kubeconfig.display().to_string();
        Command::new(program)
            .args(args)
            .arg(format!("--kubeconfig={kubeconfig}"))
            .env("KUBECONFIG", kubeconfig)
    }

    pub fn kubectl<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.cluster_scoped(&self.settings.tools.kubectl, args)
    }

    pub fn helm<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.cluster_scoped(&self.settings.tools.helm, args)
    }

    /// helm invocation that does not talk to the cluster, e.g. `helm pull`.
    pub fn helm_local<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new(&self.settings.tools.helm).args(args)
    }

    pub fn kind<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new(&self.settings.tools.kind).args(args)
    }

    pub fn docker<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new(&self.settings.tools.docker).args(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> Error {
        Error::Failed {
            command: "kubectl create".into(),
            code: Some(1),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn already_exists_matches_trimmed_suffix() {
        assert!(is_already_exists(&failed(
            "Error from server (AlreadyExists): secrets \"aws-creds\" already exists\n"
        )));
        assert!(!is_already_exists(&failed("secret already exists; retrying")));
        assert!(!is_already_exists(&failed("Already Exists")));
        assert!(!is_already_exists(&Error::Spawn {
            program: "kubectl".into(),
            err: std::io::Error::from(std::io::ErrorKind::NotFound),
        }));
    }

    #[test]
    fn not_found_matches_trimmed_suffix() {
        assert!(is_not_found(&failed(
            "Error: uninstall: Release not loaded: validator: release: not found\n"
        )));
        assert!(!is_not_found(&failed("Error: Kubernetes cluster unreachable")));
        assert!(!is_not_found(&failed("not found: retrying")));
    }

    #[test]
    fn display_masks_credentials() {
        let cmd = Command::new("kubectl")
            .args(["create", "secret", "generic", "creds"])
            .arg("--from-literal=username=admin")
            .arg("--from-literal=password=hunter2");
        assert_eq!(
            cmd.to_string(),
            "kubectl create secret generic creds --from-literal=username=admin --from-literal=password=***"
        );

        let cmd = Command::new("helm").args(["pull", "--username", "bob", "--password", "s3cret", "--untar"]);
        assert_eq!(cmd.to_string(), "helm pull --username bob --password *** --untar");

        let cmd = Command::new("helm").args(["pull", "--username=bob", "--password=s3cret"]);
        assert_eq!(cmd.to_string(), "helm pull --username=bob --password=***");
    }

    #[test]
    fn toolbox_targets_kubeconfig() {
        let settings = Settings::default();
        let toolbox = Toolbox::new(&settings, Path::new("/tmp/kc.yaml"));
        let cmd = toolbox.kubectl(["apply", "-f", "x.yaml"]);
        assert_eq!(cmd.program, "kubectl");
        assert_eq!(cmd.args, vec!["apply", "-f", "x.yaml", "--kubeconfig=/tmp/kc.yaml"]);
        assert_eq!(cmd.env, vec![("KUBECONFIG".to_string(), "/tmp/kc.yaml".to_string())]);

        let pull = toolbox.helm_local(["pull"]);
        assert!(pull.env.is_empty());
    }

    #[test]
    fn flag_value_lookup() {
        let cmd = Command::new("helm").args(["pull", "--version", "1.2.3"]);
        assert_eq!(cmd.flag_value("--version"), Some("1.2.3"));
        assert_eq!(cmd.flag_value("--untardir"), None);
    }
}
