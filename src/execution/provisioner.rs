//! Environment Provisioner
//!
//! Runs the provisioning phases in a fixed order:
//!
//! 1. Platform setup (pyenv + venv on macOS)
//! 2. Distribution setup (conda named environment)
//! 3. Tooling installation (pip)
//!
//! and, as a separate invocation at the end of the job, cleanup.
//!
//! Each phase takes a [`ProvisionContext`] and returns the updated one.
//! The first error aborts the run; nothing is retried or rolled back.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use log::{debug, info, warn};

use super::download::Downloader;
use super::runner::CommandRunner;
use crate::config::{Distribution, Platform, ProvisionConfig, Settings};
use crate::environment::pyenv::{self, PYENV_BIN};
use crate::environment::{conda, venv, Conda, InstallOutcome, PackageManager, Pip, ProvisionContext, Pyenv};
use crate::error::Result;
use crate::monitoring::{EventType, ExecutionTimeline};

/// File name the conda installer is downloaded to, inside the build directory.
pub const INSTALLER_FILE: &str = "miniconda.sh";

/// Provisions a Python environment for one build job.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use ciprovision::config::{settings_from_context, ProvisionConfig};
/// use ciprovision::environment::ProvisionContext;
/// use ciprovision::execution::{HttpDownloader, Provisioner, SystemRunner};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let ctx = ProvisionContext::from_process();
///     let settings = settings_from_context(&ctx, Path::new("."))?;
///
///     let mut provisioner = Provisioner::new(
///         settings,
///         ProvisionConfig::default(),
///         &SystemRunner,
///         &HttpDownloader,
///     );
///     let provisioned = provisioner.provision(ctx.clone())?;
///
///     for change in provisioned.diff(&ctx) {
///         println!("{}", change.to_shell());
///     }
///     Ok(())
/// }
/// ```
pub struct Provisioner<'a> {
    settings: Settings,
    config: ProvisionConfig,
    runner: &'a dyn CommandRunner,
    downloader: &'a dyn Downloader,
    timeline: ExecutionTimeline,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        settings: Settings,
        config: ProvisionConfig,
        runner: &'a dyn CommandRunner,
        downloader: &'a dyn Downloader,
    ) -> Self {
        Self {
            settings,
            config,
            runner,
            downloader,
            timeline: ExecutionTimeline::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Phase timings recorded so far.
    pub fn timeline(&self) -> &ExecutionTimeline {
        &self.timeline
    }

    /// Runs platform setup, distribution setup and tooling installation.
    pub fn provision(&mut self, ctx: ProvisionContext) -> Result<ProvisionContext> {
        info!(
            "Provisioning (platform: {}, distribution: {}, python: {}, coverage: {})",
            self.settings.platform,
            self.settings.distribution,
            self.settings.python_version.as_deref().unwrap_or("-"),
            self.settings.coverage
        );

        let ctx = self.provision_platform(ctx)?;
        let ctx = self.provision_distribution(ctx)?;
        self.install_tooling(&ctx)?;

        info!("Provisioning complete");
        Ok(ctx)
    }

    /// Sets up pyenv and a virtual environment on macOS; no-op elsewhere.
    pub fn provision_platform(&mut self, ctx: ProvisionContext) -> Result<ProvisionContext> {
        match self.settings.platform {
            Platform::Osx => self.phase("platform", |p| p.setup_pyenv(ctx)),
            Platform::Linux | Platform::Windows => {
                debug!("No platform setup needed on {}", self.settings.platform);
                Ok(ctx)
            }
        }
    }

    /// Sets up the conda named environment; no-op for the default distribution.
    pub fn provision_distribution(&mut self, ctx: ProvisionContext) -> Result<ProvisionContext> {
        match self.settings.distribution {
            Distribution::Conda => self.phase("distribution", |p| p.setup_conda(ctx)),
            Distribution::Default => {
                debug!("Using the inherited Python distribution");
                Ok(ctx)
            }
        }
    }

    /// Installs the tool set into the active environment.
    ///
    /// Returns the requested package names in install order.
    pub fn install_tooling(&mut self, ctx: &ProvisionContext) -> Result<Vec<String>> {
        self.phase("tooling", |p| {
            let pip = Pip::new(p.runner);
            let tooling = &p.config.tooling;

            pip.install(ctx, &tooling.upgrade, true)?;
            pip.install(ctx, &tooling.base, false)?;

            let mut requested: Vec<String> = tooling.upgrade.iter().chain(&tooling.base).cloned().collect();

            if p.settings.coverage {
                pip.install(ctx, &tooling.coverage, false)?;
                requested.extend(tooling.coverage.iter().cloned());
            }

            info!("Installed {} tool packages", requested.len());
            Ok(requested)
        })
    }

    /// Tears down the conda named environment.
    ///
    /// Environments provisioned through pyenv are left in place. Progress is
    /// written to `out` as `Cleaning up...DONE` on one line.
    pub fn cleanup(&mut self, ctx: ProvisionContext, out: &mut dyn Write) -> Result<ProvisionContext> {
        write!(out, "Cleaning up...")?;
        out.flush()?;

        let ctx = match self.settings.distribution {
            Distribution::Conda => self.phase("cleanup", |p| p.teardown_conda(ctx))?,
            Distribution::Default => ctx,
        };

        writeln!(out, "DONE")?;
        Ok(ctx)
    }

    /// Resolves `spec` with `manager` and installs the result if missing.
    ///
    /// Returns the resolved version.
    pub fn install_interpreter(
        &self,
        manager: &dyn PackageManager,
        ctx: &ProvisionContext,
        spec: &str,
    ) -> Result<String> {
        let version = manager.resolve_version(ctx, spec)?;

        match manager.install(ctx, &version)? {
            InstallOutcome::Installed => info!("{} installed Python {}", manager.name(), version),
            InstallOutcome::AlreadyPresent => debug!("{} already had Python {}", manager.name(), version),
        }

        Ok(version)
    }

    fn setup_pyenv(&self, ctx: ProvisionContext) -> Result<ProvisionContext> {
        let spec = self.settings.require_python_version()?;
        let ctx = pyenv::prepare_build_dirs(ctx, &self.settings.build_dir)?;

        let (manager, ctx) = match Pyenv::locate(self.runner, &ctx) {
            Some(found) => {
                let ctx = found.init_shell(ctx)?;
                (found, ctx)
            }
            None => {
                warn!("pyenv not found on PATH, shell hooks not initialized");
                (Pyenv::new(self.runner, PYENV_BIN), ctx)
            }
        };

        let version = self.install_interpreter(&manager, &ctx, spec)?;
        manager.set_global(&ctx, &version)?;
        manager.rehash(&ctx)?;

        let venv_dir = self.config.venv_path(&self.settings.build_dir);
        venv::create(self.runner, &ctx, &venv_dir)?;
        Ok(venv::activate(ctx, &venv_dir))
    }

    fn setup_conda(&self, ctx: ProvisionContext) -> Result<ProvisionContext> {
        let spec = self.settings.require_python_version()?;
        let root = self.config.conda_root(self.settings.home_dir.as_deref())?;
        let prefix = self.config.venv_path(&self.settings.build_dir);

        // conda refuses to create an environment inside an existing venv.
        let active_venv = ctx.get(venv::VIRTUAL_ENV_VAR).map(PathBuf::from);
        let ctx = venv::deactivate(ctx);
        if active_venv.as_deref() == Some(prefix.as_path()) && prefix.exists() {
            info!("Removing virtual environment {} to make room for conda", prefix.display());
            fs::remove_dir_all(&prefix)?;
        }

        let conda = Conda::new(self.runner, root);
        conda.ensure_installed(
            &ctx,
            self.downloader,
            &self.config.conda.installer_url,
            &self.settings.build_dir.join(INSTALLER_FILE),
        )?;

        let ctx = conda.activate_base(ctx);
        conda.update_self(&ctx)?;

        conda.create_env(&ctx, &prefix, spec, &self.config.conda.env_packages)?;
        let ctx = conda::activate(ctx, &prefix);

        match conda.list_packages(&ctx, &prefix) {
            Ok(packages) => {
                info!("Environment {} has {} packages", prefix.display(), packages.len());
                for package in &packages {
                    debug!("  {}={}", package.name, package.version);
                }
            }
            Err(e) => warn!("Could not list packages: {}", e),
        }

        Ok(ctx)
    }

    fn teardown_conda(&self, ctx: ProvisionContext) -> Result<ProvisionContext> {
        let root = self.config.conda_root(self.settings.home_dir.as_deref())?;
        let ctx = conda::deactivate(ctx);
        let conda = Conda::new(self.runner, root);
        conda.remove_env(&ctx, &self.config.venv_path(&self.settings.build_dir))?;
        Ok(ctx)
    }

    /// Runs `f` as a named phase on the timeline.
    fn phase<T, F>(&mut self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        info!("==> {}", name);
        self.timeline.add_event(name, EventType::Started);

        let result = f(self);

        let event = if result.is_ok() {
            EventType::Completed
        } else {
            EventType::Failed
        };
        self.timeline.add_event(name, event);
        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::config::model::DEFAULT_INSTALLER_URL;
    use crate::error::ProvisionError;
    use crate::execution::download::fake::FakeDownloader;
    use crate::execution::runner::fake::FakeRunner;

    const INSTALL_LIST: &str = "Available versions:\n  3.7.12\n  3.8.9\n  3.8.12\n  3.8.10\n  3.9.7\n";

    struct Fixture {
        build: TempDir,
        home: TempDir,
        bin: TempDir,
        runner: FakeRunner,
        downloader: FakeDownloader,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                build: tempdir().unwrap(),
                home: tempdir().unwrap(),
                bin: tempdir().unwrap(),
                runner: FakeRunner::new(),
                downloader: FakeDownloader::new(),
            }
        }

        fn settings(&self, platform: Platform, distribution: Distribution, coverage: bool) -> Settings {
            Settings {
                platform,
                distribution,
                python_version: Some("3.8".to_string()),
                coverage,
                build_dir: self.build.path().to_path_buf(),
                home_dir: Some(self.home.path().to_path_buf()),
            }
        }

        fn provisioner(&self, settings: Settings) -> Provisioner<'_> {
            Provisioner::new(settings, ProvisionConfig::default(), &self.runner, &self.downloader)
        }

        fn ctx(&self) -> ProvisionContext {
            ProvisionContext::from_vars([
                ("PATH", self.bin.path().display().to_string()),
                ("HOME", self.home.path().display().to_string()),
            ])
        }

        fn install_pyenv(&self) {
            fs::write(self.bin.path().join("pyenv"), "").unwrap();
            self.runner
                .respond("pyenv root", "/Users/travis/.pyenv\n")
                .respond("pyenv install --list", INSTALL_LIST)
                .respond("pyenv versions --bare", "system\n");
        }

        fn cache_conda(&self) -> PathBuf {
            let root = self.home.path().join("miniconda");
            fs::create_dir_all(root.join("bin")).unwrap();
            fs::write(root.join("bin/conda"), "").unwrap();
            root
        }

        fn venv(&self) -> PathBuf {
            self.build.path().join(".venv")
        }
    }

    fn dir_listing(dir: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_platform_noop_off_macos() {
        let fx = Fixture::new();
        fx.install_pyenv();

        for platform in [Platform::Linux, Platform::Windows] {
            let mut provisioner = fx.provisioner(fx.settings(platform, Distribution::Default, false));
            let ctx = provisioner.provision_platform(fx.ctx()).unwrap();
            assert_eq!(ctx, fx.ctx());
        }

        assert!(fx.runner.calls().is_empty());
        assert!(dir_listing(fx.build.path()).is_empty());
    }

    #[test]
    fn test_distribution_noop_for_default() {
        let fx = Fixture::new();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Default, false));

        let ctx = provisioner.provision_distribution(fx.ctx()).unwrap();

        assert_eq!(ctx, fx.ctx());
        assert!(fx.runner.calls().is_empty());
        assert!(fx.downloader.urls().is_empty());
    }

    #[test]
    fn test_macos_pyenv_end_to_end() {
        let fx = Fixture::new();
        fx.install_pyenv();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Default, false));

        let ctx = provisioner.provision_platform(fx.ctx()).unwrap();

        let venv = fx.venv();
        assert_eq!(
            fx.runner.lines(),
            vec![
                "pyenv root".to_string(),
                "pyenv install --list".to_string(),
                "pyenv versions --bare".to_string(),
                "pyenv install --skip-existing 3.8.12".to_string(),
                "pyenv global 3.8.12".to_string(),
                "pyenv rehash".to_string(),
                format!("python -m venv {}", venv.display()),
            ]
        );

        assert_eq!(ctx.get("VIRTUAL_ENV"), venv.to_str());
        assert_eq!(ctx.path_entries()[0], venv.join("bin"));
        assert_eq!(ctx.path_entries()[1], PathBuf::from("/Users/travis/.pyenv/shims"));

        for sub in ["log", "tmp", "cache"] {
            assert!(fx.build.path().join(".pyenv").join(sub).is_dir());
        }
        assert_eq!(
            ctx.get("PYTHON_BUILD_CACHE_PATH"),
            fx.build.path().join(".pyenv/cache").to_str()
        );
    }

    #[test]
    fn test_macos_venv_is_created_with_shimmed_python() {
        let fx = Fixture::new();
        fx.install_pyenv();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Default, false));

        provisioner.provision_platform(fx.ctx()).unwrap();

        let calls = fx.runner.calls();
        let venv_call = calls.last().unwrap();
        assert!(venv_call
            .path
            .as_deref()
            .unwrap()
            .starts_with("/Users/travis/.pyenv/shims:"));
    }

    #[test]
    fn test_macos_without_pyenv_on_path() {
        let fx = Fixture::new();
        fx.runner
            .respond("pyenv install --list", INSTALL_LIST)
            .respond("pyenv versions --bare", "3.8.12\n");
        let mut provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Default, false));

        let ctx = provisioner.provision_platform(fx.ctx()).unwrap();

        assert_eq!(fx.runner.count_prefix("pyenv root"), 0);
        assert_eq!(fx.runner.count_prefix("pyenv install --skip-existing"), 0);
        assert_eq!(fx.runner.calls()[0].command.program, PathBuf::from("pyenv"));
        assert!(ctx.get("PYENV_SHELL").is_none());
        assert_eq!(ctx.get("VIRTUAL_ENV"), fx.venv().to_str());
    }

    #[test]
    fn test_macos_unresolvable_version_aborts() {
        let fx = Fixture::new();
        fx.install_pyenv();
        let mut settings = fx.settings(Platform::Osx, Distribution::Default, false);
        settings.python_version = Some("3.11".to_string());
        let mut provisioner = fx.provisioner(settings);

        let err = provisioner.provision_platform(fx.ctx()).unwrap_err();

        assert!(matches!(err, ProvisionError::VersionResolution(ref v) if v == "3.11"));
        assert_eq!(fx.runner.count_prefix("pyenv install --skip-existing"), 0);
        assert_eq!(fx.runner.count_prefix("python -m venv"), 0);
        assert!(provisioner.timeline().phases()[0].failed);
    }

    #[test]
    fn test_macos_install_failure_aborts() {
        let fx = Fixture::new();
        fx.install_pyenv();
        fx.runner.fail("pyenv install --skip-existing", "BUILD FAILED");
        let mut provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Default, false));

        let err = provisioner.provision_platform(fx.ctx()).unwrap_err();

        assert!(matches!(err, ProvisionError::Install { .. }));
        assert_eq!(fx.runner.count_prefix("pyenv global"), 0);
    }

    #[test]
    fn test_macos_requires_python_version() {
        let fx = Fixture::new();
        let mut settings = fx.settings(Platform::Osx, Distribution::Default, false);
        settings.python_version = None;
        let mut provisioner = fx.provisioner(settings);

        let err = provisioner.provision_platform(fx.ctx()).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
        assert!(fx.runner.calls().is_empty());
    }

    #[test]
    fn test_interpreter_install_is_idempotent() {
        let fx = Fixture::new();
        fx.install_pyenv();
        let provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Default, false));
        let pyenv = Pyenv::new(&fx.runner, "pyenv");
        let ctx = fx.ctx();

        let first = provisioner.install_interpreter(&pyenv, &ctx, "3.8").unwrap();
        fx.runner.respond("pyenv versions --bare", "system\n3.8.12\n");
        let second = provisioner.install_interpreter(&pyenv, &ctx, "3.8").unwrap();

        assert_eq!(first, "3.8.12");
        assert_eq!(second, "3.8.12");
        assert_eq!(fx.runner.count_prefix("pyenv install --skip-existing"), 1);
    }

    #[test]
    fn test_conda_cached_skips_download() {
        let fx = Fixture::new();
        let root = fx.cache_conda();
        fx.runner.respond("conda list", r#"[{"name": "python", "version": "3.8.12"}]"#);
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        let ctx = provisioner.provision_distribution(fx.ctx()).unwrap();

        assert!(fx.downloader.urls().is_empty());
        let venv = fx.venv();
        assert_eq!(
            fx.runner.lines(),
            vec![
                "conda update --yes conda".to_string(),
                format!("conda create -p {} --yes python=3.8 pip virtualenv", venv.display()),
                format!("conda list -p {} --json", venv.display()),
            ]
        );

        assert_eq!(ctx.get("CONDA_PREFIX"), venv.to_str());
        let path = ctx.path_entries();
        assert_eq!(path[0], venv.join("bin"));
        assert_eq!(path[1], root.join("bin"));
    }

    #[test]
    fn test_conda_fresh_install_downloads() {
        let fx = Fixture::new();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        provisioner.provision_distribution(fx.ctx()).unwrap();

        assert_eq!(fx.downloader.urls(), vec![DEFAULT_INSTALLER_URL.to_string()]);
        let installer = fx.build.path().join(INSTALLER_FILE);
        assert!(installer.exists());

        let calls = fx.runner.calls();
        assert_eq!(calls[0].command.program, installer);
        assert_eq!(calls[1].line, "conda update --yes conda");
    }

    #[test]
    fn test_conda_download_failure_aborts() {
        let fx = Fixture::new();
        let downloader = FakeDownloader::failing();
        let mut provisioner = Provisioner::new(
            fx.settings(Platform::Linux, Distribution::Conda, false),
            ProvisionConfig::default(),
            &fx.runner,
            &downloader,
        );

        let err = provisioner.provision_distribution(fx.ctx()).unwrap_err();

        assert!(matches!(err, ProvisionError::Download { .. }));
        assert!(fx.runner.calls().is_empty());
    }

    #[test]
    fn test_conda_create_failure_aborts() {
        let fx = Fixture::new();
        fx.cache_conda();
        fx.runner.fail("conda create", "PackagesNotFoundError");
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        let err = provisioner.provision_distribution(fx.ctx()).unwrap_err();

        assert!(matches!(err, ProvisionError::EnvironmentCreate { .. }));
        assert_eq!(fx.runner.count_prefix("conda list"), 0);
    }

    #[test]
    fn test_conda_list_failure_is_not_fatal() {
        let fx = Fixture::new();
        fx.cache_conda();
        fx.runner.fail("conda list", "boom");
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        let ctx = provisioner.provision_distribution(fx.ctx()).unwrap();
        assert_eq!(ctx.get("CONDA_PREFIX"), fx.venv().to_str());
    }

    #[test]
    fn test_conda_deactivates_virtualenv_first() {
        let fx = Fixture::new();
        fx.cache_conda();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        let ctx = venv::activate(fx.ctx(), Path::new("/home/travis/virtualenv/python3.8"));
        let ctx = provisioner.provision_distribution(ctx).unwrap();

        assert!(ctx.get("VIRTUAL_ENV").is_none());
        assert!(!ctx
            .path_entries()
            .contains(&PathBuf::from("/home/travis/virtualenv/python3.8/bin")));
    }

    #[test]
    fn test_conda_replaces_virtualenv_at_same_prefix() {
        let fx = Fixture::new();
        fx.cache_conda();
        fs::create_dir_all(fx.venv().join("bin")).unwrap();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Conda, false));

        let ctx = venv::activate(fx.ctx(), &fx.venv());
        let ctx = provisioner.provision_distribution(ctx).unwrap();

        assert!(!fx.venv().exists());
        assert_eq!(fx.runner.count_prefix("conda create"), 1);
        assert!(ctx.get("VIRTUAL_ENV").is_none());
        assert_eq!(ctx.get("CONDA_PREFIX"), fx.venv().to_str());
    }

    #[test]
    fn test_conda_keeps_unrelated_virtualenv() {
        let fx = Fixture::new();
        fx.cache_conda();
        let other = fx.build.path().join("other-env");
        fs::create_dir_all(other.join("bin")).unwrap();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        let ctx = venv::activate(fx.ctx(), &other);
        provisioner.provision_distribution(ctx).unwrap();

        assert!(other.is_dir());
    }

    #[test]
    fn test_conda_without_home_is_config_error() {
        let fx = Fixture::new();
        let mut settings = fx.settings(Platform::Linux, Distribution::Conda, false);
        settings.home_dir = None;
        let mut provisioner = fx.provisioner(settings);

        let err = provisioner.provision_distribution(fx.ctx()).unwrap_err();

        assert!(matches!(err, ProvisionError::Config(_)));
        assert!(fx.runner.calls().is_empty());
        assert!(fx.downloader.urls().is_empty());
    }

    #[test]
    fn test_default_distribution_needs_no_home() {
        let fx = Fixture::new();
        let mut settings = fx.settings(Platform::Linux, Distribution::Default, false);
        settings.home_dir = None;
        let mut provisioner = fx.provisioner(settings);

        provisioner.provision(fx.ctx()).unwrap();
        let mut out = Vec::new();
        provisioner.cleanup(fx.ctx(), &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Cleaning up...DONE\n");
    }

    #[test]
    fn test_tooling_without_coverage() {
        let fx = Fixture::new();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Default, false));

        let installed = provisioner.install_tooling(&fx.ctx()).unwrap();

        assert_eq!(installed, vec!["pip", "setuptools", "sphinx", "tox"]);
        assert_eq!(
            fx.runner.lines(),
            vec![
                "python -m pip install --upgrade pip setuptools",
                "python -m pip install sphinx tox",
            ]
        );
        for line in fx.runner.lines() {
            assert!(!line.contains("coverage") && !line.contains("flake8"));
        }
    }

    #[test]
    fn test_tooling_with_coverage() {
        let fx = Fixture::new();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Default, true));

        let installed = provisioner.install_tooling(&fx.ctx()).unwrap();

        assert_eq!(installed.len(), 10);
        assert_eq!(fx.runner.calls().len(), 3);
        assert_eq!(
            fx.runner.lines()[2],
            "python -m pip install pytest-cov pytest-virtualenv coverage coveralls flake8 pre-commit"
        );
    }

    #[test]
    fn test_tooling_failure_stops_before_coverage() {
        let fx = Fixture::new();
        fx.runner.fail("python -m pip install sphinx", "network error");
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Default, true));

        let err = provisioner.install_tooling(&fx.ctx()).unwrap_err();

        assert!(matches!(err, ProvisionError::Install { .. }));
        assert_eq!(fx.runner.calls().len(), 2);
    }

    #[test]
    fn test_provision_runs_phases_in_order() {
        let fx = Fixture::new();
        fx.install_pyenv();
        fx.cache_conda();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Conda, true));

        let ctx = provisioner.provision(fx.ctx()).unwrap();

        let lines = fx.runner.lines();
        let venv_at = lines.iter().position(|l| l.starts_with("python -m venv")).unwrap();
        let create_at = lines.iter().position(|l| l.starts_with("conda create")).unwrap();
        let pip_at = lines.iter().position(|l| l.starts_with("python -m pip")).unwrap();
        assert!(venv_at < create_at && create_at < pip_at);

        assert!(ctx.get("VIRTUAL_ENV").is_none());
        assert_eq!(ctx.get("CONDA_PREFIX"), fx.venv().to_str());

        let phases: Vec<String> = provisioner
            .timeline()
            .phases()
            .into_iter()
            .map(|p| p.phase)
            .collect();
        assert_eq!(phases, vec!["platform", "distribution", "tooling"]);
    }

    #[test]
    fn test_provision_stops_at_first_failure() {
        let fx = Fixture::new();
        fx.cache_conda();
        fx.runner.fail("conda update", "solver error");
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, true));

        let err = provisioner.provision(fx.ctx()).unwrap_err();

        assert!(matches!(err, ProvisionError::Install { .. }));
        assert_eq!(fx.runner.count_prefix("python -m pip"), 0);
    }

    #[test]
    fn test_cleanup_default_leaves_filesystem_alone() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.venv().join("bin")).unwrap();
        let before = dir_listing(fx.build.path());
        let mut provisioner = fx.provisioner(fx.settings(Platform::Osx, Distribution::Default, false));

        let mut out = Vec::new();
        let ctx = provisioner.cleanup(fx.ctx(), &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Cleaning up...DONE\n");
        assert_eq!(dir_listing(fx.build.path()), before);
        assert!(fx.venv().exists());
        assert!(fx.runner.calls().is_empty());
        assert_eq!(ctx, fx.ctx());
    }

    #[test]
    fn test_cleanup_conda_removes_environment() {
        let fx = Fixture::new();
        fx.cache_conda();
        fs::create_dir_all(fx.venv().join("bin")).unwrap();
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        let active = conda::activate(fx.ctx(), &fx.venv());
        let mut out = Vec::new();
        let ctx = provisioner.cleanup(active, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Cleaning up...DONE\n");
        assert!(!fx.venv().exists());
        assert_eq!(
            fx.runner.lines(),
            vec![format!("conda remove -p {} --all --yes", fx.venv().display())]
        );
        assert!(ctx.get("CONDA_PREFIX").is_none());
        assert_eq!(ctx, fx.ctx());
    }

    #[test]
    fn test_cleanup_failure_stops_before_done() {
        let fx = Fixture::new();
        fx.runner.fail("conda remove", "EnvironmentLocationNotFound");
        let mut provisioner = fx.provisioner(fx.settings(Platform::Linux, Distribution::Conda, false));

        let mut out = Vec::new();
        let err = provisioner.cleanup(fx.ctx(), &mut out).unwrap_err();

        assert!(matches!(err, ProvisionError::Command { .. }));
        assert_eq!(String::from_utf8(out).unwrap(), "Cleaning up...");
    }
}
