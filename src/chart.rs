use crate::exec::{self, CommandRunner, Toolbox};
use crate::release::{ChartSource, ReleaseOptions};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("create chart directory: {0}")]
    TempDir(std::io::Error),

    #[error("helm pull: {0}")]
    Pull(exec::Error),

    #[error("chart {0} missing after helm pull")]
    Missing(String),
}

pub fn is_oci(repository: &str) -> bool {
    repository.starts_with("oci://")
}

/// OCI chart registries reject the `v` prefix that classic chart repositories accept.
pub fn oci_version(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Run `install` against a chart source helm can install from.
///
/// Charts in classic repositories are passed through untouched. Charts in
/// OCI registries are pulled and extracted into a temporary directory under
/// `work_dir` first, and `install` receives options pointing at the local
/// copy. The directory is removed after `install` returns, whatever the
/// outcome; a failed removal is only logged.
pub fn with_resolved_chart<T, E>(
    toolbox: &Toolbox,
    runner: &dyn CommandRunner,
    work_dir: &Path,
    options: &ReleaseOptions,
    install: impl FnOnce(&ReleaseOptions) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<Error>,
{
    let ChartSource::Repository { url, name } = &options.source else {
        return install(options);
    };
    if !is_oci(url) {
        return install(options);
    }

    let dir = tempfile::Builder::new()
        .prefix("chart-")
        .tempdir_in(work_dir)
        .map_err(Error::TempDir)?;
    let chart_path = pull(toolbox, runner, options, url, name, dir.path())?;

    let resolved = ReleaseOptions {
        source: ChartSource::Local(chart_path),
        ..options.clone()
    };
    let result = install(&resolved);

    let dir_path = dir.path().display().to_string();
    match dir.close() {
        Ok(()) => debug!("Removed chart directory {dir_path}"),
        Err(err) => warn!("could not remove chart directory {dir_path}: {err}"),
    }
    result
}

fn pull(
    toolbox: &Toolbox,
    runner: &dyn CommandRunner,
    options: &ReleaseOptions,
    url: &str,
    name: &str,
    dest: &Path,
) -> Result<PathBuf, Error> {
    let reference = format!("{}/{}", url.trim_end_matches('/'), name);
    let version = oci_version(&options.version);
    info!("Pulling chart {reference} version {version}");

    let mut args = vec!["pull".to_string(), reference];
    if !version.is_empty() {
        args.extend(["--version".to_string(), version.to_string()]);
    }
    args.extend([
        "--untar".to_string(),
        "--untardir".to_string(),
        dest.display().to_string(),
    ]);
    args.extend(options.tls_and_auth_args());

    runner.run(&toolbox.helm_local(args)).map_err(Error::Pull)?;

    let chart_path = dest.join(name);
    if !chart_path.is_dir() {
        return Err(Error::Missing(chart_path.display().to_string()));
    }
    Ok(chart_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failure, settings, FakeRunner};
    use std::cell::Cell;

    fn options(url: &str, version: &str) -> ReleaseOptions {
        ReleaseOptions {
            source: ChartSource::Repository {
                url: url.into(),
                name: "validator".into(),
            },
            version: version.into(),
            values: String::new(),
            insecure_skip_verify: false,
            ca_file: None,
            basic_auth: None,
        }
    }

    /// Simulates `helm pull --untar` by creating the chart directory.
    fn untar(cmd: &exec::Command) -> Option<Result<exec::Output, exec::Error>> {
        let dir = cmd.flag_value("--untardir")?;
        std::fs::create_dir_all(Path::new(dir).join("validator")).unwrap();
        Some(Ok(Default::default()))
    }

    #[test]
    fn detects_oci_references() {
        assert!(is_oci("oci://registry.example/charts"));
        assert!(!is_oci("https://validator-labs.github.io/validator"));
        assert_eq!(oci_version("v1.2.3"), "1.2.3");
        assert_eq!(oci_version("1.2.3"), "1.2.3");
    }

    #[test]
    fn classic_repository_is_passed_through() {
        let settings = settings();
        let toolbox = Toolbox::new(&settings, Path::new("kc"));
        let runner = FakeRunner::new();
        let work = tempfile::tempdir().unwrap();
        let opts = options("https://charts.example", "v1.0.0");

        let seen = with_resolved_chart(&toolbox, &runner, work.path(), &opts, |o| {
            Ok::<_, Error>(o.source.clone())
        })
        .unwrap();
        assert_eq!(seen, opts.source);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn oci_chart_is_pulled_without_v_prefix_and_cleaned_up() {
        let settings = settings();
        let toolbox = Toolbox::new(&settings, Path::new("kc"));
        let runner = FakeRunner::new().respond(untar);
        let work = tempfile::tempdir().unwrap();
        let opts = options("oci://registry.example/charts", "v1.2.3");
        let existed = Cell::new(false);

        let local = with_resolved_chart(&toolbox, &runner, work.path(), &opts, |o| {
            let ChartSource::Local(path) = &o.source else {
                panic!("expected a local chart");
            };
            existed.set(path.is_dir());
            Ok::<_, Error>(path.clone())
        })
        .unwrap();

        assert!(existed.get());
        assert!(!local.exists());
        let pull = &runner.calls()[0];
        assert_eq!(pull.args[0], "pull");
        assert_eq!(pull.args[1], "oci://registry.example/charts/validator");
        assert_eq!(pull.flag_value("--version"), Some("1.2.3"));
        assert!(pull.has_arg("--untar"));
    }

    #[test]
    fn chart_directory_is_removed_when_install_fails() {
        let settings = settings();
        let toolbox = Toolbox::new(&settings, Path::new("kc"));
        let runner = FakeRunner::new().respond(untar);
        let work = tempfile::tempdir().unwrap();
        let opts = options("oci://registry.example/charts", "1.2.3");

        let result: Result<(), Error> =
            with_resolved_chart(&toolbox, &runner, work.path(), &opts, |_| Err(Error::Missing("x".into())));
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn pull_failure_is_fatal() {
        let settings = settings();
        let toolbox = Toolbox::new(&settings, Path::new("kc"));
        let runner = FakeRunner::new().respond(|cmd| Some(Err(failure(cmd, "401 unauthorized"))));
        let work = tempfile::tempdir().unwrap();
        let opts = options("oci://registry.example/charts", "1.2.3");
        let mut installed = false;

        let result = with_resolved_chart(&toolbox, &runner, work.path(), &opts, |_| {
            installed = true;
            Ok::<_, Error>(())
        });
        assert!(matches!(result, Err(Error::Pull(_))));
        assert!(!installed);
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }
}
