//! Update orchestrator.
//!
//! Promotes a committed stage over the live installation. It runs from the
//! working copy so it never overwrites its own executable, and it drives a
//! small state machine:
//!
//! ```text
//! Idle -> Disabling -> Syncing -> Relaunching -> CleaningUp -> Done
//!            |            |
//!            v            v
//!          Failed   Relaunching -> Failed
//! ```
//!
//! Disabling renames the live executable to `<name>.disabled`, retrying until
//! the configured timeout. The rename both blocks new launches of the old
//! version and proves the file can be replaced. Once syncing begins there is
//! no rollback: on failure the application is relaunched from whatever state
//! the installation is in, and the stage plus its ready marker are kept so a
//! later `update` can finish the job.

use crate::constants::DISABLED_SUFFIX;
use crate::core::UpdateError;
use crate::layout::AppLayout;
use crate::sync::{DirectorySynchronizer, FileOps, LocalFileOps, SyncReport};
use crate::utils::fs::remove_dir_all;
use crate::utils::platform::detached_command;
use anyhow::Result;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Delay between rename attempts while disabling.
const DISABLE_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Where a promotion is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Nothing has happened yet.
    Idle,
    /// Renaming the live executable out of the way.
    Disabling,
    /// Mirroring the staged directory onto the installed one.
    Syncing,
    /// Starting the application again.
    Relaunching,
    /// Removing the stage and the promoted ready marker.
    CleaningUp,
    /// Promotion finished.
    Done,
    /// Promotion stopped early or did not converge.
    Failed,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Disabling => "disabling",
            Self::Syncing => "syncing",
            Self::Relaunching => "relaunching",
            Self::CleaningUp => "cleaning up",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Starts executables.
pub trait Launcher {
    /// Start `program` with `args` and return without waiting for it.
    fn launch(&self, program: &Path, args: &[String]) -> Result<()>;
}

impl<T: Launcher + ?Sized> Launcher for &T {
    fn launch(&self, program: &Path, args: &[String]) -> Result<()> {
        (**self).launch(program, args)
    }
}

/// [`Launcher`] that spawns a detached child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> Result<()> {
        debug!("Launching {} {:?}", program.display(), args);
        detached_command(program).args(args).spawn().map_err(|e| UpdateError::LaunchFailed {
            path: program.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Summary of a completed promotion.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    /// Terminal state
    pub state: UpdateState,
    /// What the synchronizer did
    pub sync: SyncReport,
    /// Whether the application was started again
    pub relaunched: bool,
}

/// Drives one promotion for one application layout.
pub struct UpdateOrchestrator<'a, L: Launcher, O: FileOps = LocalFileOps> {
    layout: &'a AppLayout,
    launcher: L,
    synchronizer: DirectorySynchronizer<O>,
    disable_timeout: Duration,
    handle_release_delay: Duration,
    state: UpdateState,
    history: Vec<UpdateState>,
}

impl<'a, L: Launcher> UpdateOrchestrator<'a, L> {
    /// Orchestrator with local file operations and no settle delay.
    pub fn new(layout: &'a AppLayout, launcher: L, disable_timeout: Duration) -> Self {
        Self::with_synchronizer(layout, launcher, disable_timeout, DirectorySynchronizer::new())
    }
}

impl<'a, L: Launcher, O: FileOps> UpdateOrchestrator<'a, L, O> {
    /// Orchestrator with a custom synchronizer.
    pub fn with_synchronizer(
        layout: &'a AppLayout,
        launcher: L,
        disable_timeout: Duration,
        synchronizer: DirectorySynchronizer<O>,
    ) -> Self {
        Self {
            layout,
            launcher,
            synchronizer,
            disable_timeout,
            handle_release_delay: Duration::ZERO,
            state: UpdateState::Idle,
            history: vec![UpdateState::Idle],
        }
    }

    /// Pause after disabling, giving the exiting application time to close its handles.
    #[must_use]
    pub fn with_handle_release_delay(mut self, delay: Duration) -> Self {
        self.handle_release_delay = delay;
        self
    }

    /// Current state.
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Every state entered so far, starting with [`UpdateState::Idle`].
    pub fn history(&self) -> &[UpdateState] {
        &self.history
    }

    fn enter(&mut self, state: UpdateState) {
        debug!("Update state: {} -> {}", self.state, state);
        self.state = state;
        self.history.push(state);
    }

    /// Promote the stage, then relaunch `main_exe` from the installed directory.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::NothingStaged`] without a committed stage; nothing is touched
    /// - [`UpdateError::DisableTimeout`] if the executable stays locked; nothing is touched
    /// - [`UpdateError::SyncFailed`] if promotion did not converge; the
    ///   application is still relaunched
    /// - [`UpdateError::LaunchFailed`] if promotion succeeded but the relaunch did not
    pub fn run(&mut self, main_exe: &str) -> Result<UpdateReport> {
        let main_path = self.layout.installed_exe(main_exe);

        self.enter(UpdateState::Disabling);
        if !self.layout.is_ready() {
            self.enter(UpdateState::Failed);
            return Err(UpdateError::NothingStaged {
                path: self.layout.staged().display().to_string(),
            }
            .into());
        }

        info!("Disabling {}", main_path.display());
        if let Err(e) = self.disable(&main_path) {
            error!("Disable failed: {}", e);
            self.enter(UpdateState::Failed);
            return Err(e.into());
        }
        if !self.handle_release_delay.is_zero() {
            std::thread::sleep(self.handle_release_delay);
        }

        self.enter(UpdateState::Syncing);
        info!(
            "Promoting {} to {}",
            self.layout.staged().display(),
            self.layout.installed().display()
        );
        let sync = self.synchronizer.mirror(self.layout.staged(), self.layout.installed());

        if let Some(err) = sync.error() {
            error!("Promotion did not converge: {}", err);
            self.enter(UpdateState::Relaunching);
            if let Err(e) = self.launcher.launch(&main_path, &[]) {
                error!("Relaunch after failed promotion also failed: {:#}", e);
            }
            self.enter(UpdateState::Failed);
            return Err(err.into());
        }

        self.enter(UpdateState::Relaunching);
        let launch = self.launcher.launch(&main_path, &[]);
        if let Err(e) = &launch {
            error!("Relaunch failed: {:#}", e);
        }

        self.enter(UpdateState::CleaningUp);
        self.cleanup();

        self.enter(UpdateState::Done);
        info!("Update complete");
        launch?;

        Ok(UpdateReport {
            state: self.state,
            sync,
            relaunched: true,
        })
    }

    fn disable(&self, main_path: &Path) -> Result<(), UpdateError> {
        let disabled_path = disabled_path(main_path);
        let started = Instant::now();

        loop {
            let err = match std::fs::rename(main_path, &disabled_path) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            // A previous promotion already moved it aside and then failed
            if err.kind() == io::ErrorKind::NotFound && disabled_path.exists() {
                warn!("{} is already disabled", main_path.display());
                return Ok(());
            }

            if started.elapsed() >= self.disable_timeout {
                return Err(UpdateError::DisableTimeout {
                    path: main_path.display().to_string(),
                    timeout: self.disable_timeout,
                    reason: err.to_string(),
                });
            }
            std::thread::sleep(DISABLE_RETRY_INTERVAL);
        }
    }

    // Best effort; the working copy stays because we are running from it
    fn cleanup(&self) {
        if let Err(e) = remove_dir_all(self.layout.staged()) {
            warn!("Failed to remove {}: {:#}", self.layout.staged().display(), e);
        }
        let marker = self.layout.installed_ready_marker();
        if let Err(e) = std::fs::remove_file(&marker)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove {}: {}", marker.display(), e);
        }
    }
}

/// `<main>.disabled` next to the live executable.
pub fn disabled_path(main_path: &Path) -> PathBuf {
    let mut name = main_path.as_os_str().to_os_string();
    name.push(DISABLED_SUFFIX);
    PathBuf::from(name)
}
