//! Starting batch jobs as detached processes

use crate::coordinator::RefreshRequest;
use resviz_core::RunMode;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Environment variable naming the executable to launch instead of the
/// current one
pub const EXECUTABLE_VAR: &str = "RESVIZ_EXECUTABLE";

/// Command-line arguments for one batch job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInvocation {
    /// Services to fetch
    pub services: Vec<String>,
    /// Region, when the run mode passes it on the command line
    pub region: Option<String>,
    /// Profile, when the run mode passes it on the command line
    pub profile: Option<String>,
    /// Clear the scope's cache before fetching
    pub clear_cache: bool,
    /// Ignore a `running` record
    pub force: bool,
}

impl BatchInvocation {
    /// Build the invocation for a request under a run mode
    ///
    /// Managed runs pass neither region nor profile; the job derives both
    /// from its environment.
    #[must_use]
    pub fn new(request: &RefreshRequest, run_mode: RunMode) -> Self {
        Self {
            services: request.services.clone(),
            region: run_mode
                .passes_region_in_command()
                .then(|| request.region.clone()),
            profile: if run_mode.passes_profile_in_command(request.profile.as_deref()) {
                request.profile.clone()
            } else {
                None
            },
            clear_cache: request.clear_cache,
            force: request.force,
        }
    }

    /// Arguments after the program name, starting with the subcommand
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["fetch".to_string()];
        for service in &self.services {
            args.push("--services".to_string());
            args.push(service.clone());
        }
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(profile) = &self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        if self.clear_cache {
            args.push("--clear-cache".to_string());
        }
        if self.force {
            args.push("--force".to_string());
        }
        args
    }
}

/// Starts batch jobs without waiting for them
pub trait JobLauncher: Send + Sync {
    /// Whether a job can be started at all
    fn is_available(&self) -> bool;

    /// Start a job and return its process id
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be started.
    fn launch(&self, invocation: &BatchInvocation) -> io::Result<u32>;
}

/// Launches the resviz binary itself with the `fetch` subcommand
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    log_dir: PathBuf,
    config: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Launch `program`, pointing its rotated batch log at `log_dir`
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            log_dir: log_dir.into(),
            config: None,
        }
    }

    /// Launch `RESVIZ_EXECUTABLE` if set, otherwise the running binary
    ///
    /// # Errors
    ///
    /// Returns an error if the current executable cannot be determined.
    pub fn from_env(log_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let program = match std::env::var(EXECUTABLE_VAR) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => std::env::current_exe()?,
        };
        Ok(Self::new(program, log_dir))
    }

    /// Pass `--config` to launched jobs
    #[must_use]
    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    /// Program that is launched
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, invocation: &BatchInvocation) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(config) = &self.config {
            cmd.arg("--config").arg(config);
        }
        // The job records its report, errors and panics in the rotated
        // batch log, so its own streams are discarded
        cmd.args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // RESVIZ_* and RUST_LOG are inherited
        cmd.env("RESVIZ_LOG_DIR", &self.log_dir);
        cmd
    }
}

impl JobLauncher for ProcessLauncher {
    fn is_available(&self) -> bool {
        self.program.is_file()
    }

    fn launch(&self, invocation: &BatchInvocation) -> io::Result<u32> {
        let mut cmd = self.command(invocation);
        debug!(program = %self.program.display(), args = ?invocation.args(), "Batch command");

        // Platform-specific detachment configuration
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Detach from parent process group using setsid
            #[allow(unsafe_code)]
            unsafe {
                cmd.pre_exec(|| {
                    // Create a new session, detaching from controlling terminal
                    if libc::setsid() == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = cmd.spawn()?;
        let pid = child.id();
        info!(pid, "Spawned batch job");

        // Reap the child so a long-lived frontend does not collect zombies
        std::thread::spawn(move || {
            if let Err(e) = child.wait() {
                debug!(pid, error = %e, "Failed to wait for batch job");
            }
        });
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(profile: Option<&str>) -> RefreshRequest {
        RefreshRequest {
            services: vec!["EC2".to_string(), "S3".to_string()],
            region: "ap-northeast-1".to_string(),
            profile: profile.map(str::to_string),
            clear_cache: true,
            force: false,
        }
    }

    #[test]
    fn test_local_invocation_passes_region_and_profile() {
        let invocation = BatchInvocation::new(&request(Some("sandbox")), RunMode::Local);
        assert_eq!(
            invocation.args(),
            vec![
                "fetch",
                "--services",
                "EC2",
                "--services",
                "S3",
                "--region",
                "ap-northeast-1",
                "--profile",
                "sandbox",
                "--clear-cache"
            ]
        );
    }

    #[test]
    fn test_docker_invocation_without_profile() {
        let invocation = BatchInvocation::new(&request(None), RunMode::Docker);
        assert_eq!(invocation.region.as_deref(), Some("ap-northeast-1"));
        assert_eq!(invocation.profile, None);
    }

    #[test]
    fn test_managed_invocation_omits_region_and_profile() {
        let invocation = BatchInvocation::new(&request(Some("sandbox")), RunMode::Ecs);
        let args = invocation.args();
        assert!(!args.contains(&"--region".to_string()));
        assert!(!args.contains(&"--profile".to_string()));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let launcher = ProcessLauncher::new(tmp.path().join("absent"), tmp.path());
        assert!(!launcher.is_available());
        assert!(launcher.launch(&BatchInvocation::new(&request(None), RunMode::Local)).is_err());
    }

    #[test]
    fn test_config_is_passed_before_subcommand() {
        let tmp = tempfile::TempDir::new().unwrap();
        let launcher = ProcessLauncher::new("/bin/resviz", tmp.path())
            .with_config(Some(PathBuf::from("/etc/resviz.toml")));
        let cmd = launcher.command(&BatchInvocation::new(&request(None), RunMode::Local));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..3], &["--config", "/etc/resviz.toml", "fetch"]);
    }
}
