//! Host application integration.
//!
//! A host application calls [`HostUpdater::check`] once at startup. Only the
//! first running instance of the host takes part; later instances carry on
//! untouched. The first instance either hands off to the working-copy updater
//! (when a stage is ready) and must exit, or starts a background `download`
//! and carries on.

use crate::guard::{InstanceGuard, LockScope, default_lock_dir};
use crate::layout::AppLayout;
use crate::orchestrator::Launcher;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What the host should do after [`HostUpdater::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    /// Keep running normally.
    ContinueAsUsual,
    /// Exit immediately so the updater can replace the executable.
    ExitNow,
}

/// Result of a host check.
#[derive(Debug)]
pub struct HostCheck {
    /// What the host should do next
    pub action: HostAction,
    /// Host-scope lock, held by the first instance. Keep it alive for the
    /// lifetime of the host process.
    pub guard: Option<InstanceGuard>,
}

/// Startup hook for applications shipping with the updater.
pub struct HostUpdater<'a> {
    layout: AppLayout,
    launcher: &'a dyn Launcher,
    updater_name: String,
    lock_dir: PathBuf,
}

impl<'a> HostUpdater<'a> {
    /// Create a hook for the application at `layout`.
    pub fn new(layout: AppLayout, launcher: &'a dyn Launcher) -> Self {
        Self {
            layout,
            launcher,
            updater_name: format!("stagehand{}", std::env::consts::EXE_SUFFIX),
            lock_dir: default_lock_dir(),
        }
    }

    /// File name of the updater binary in the installed and working-copy directories.
    #[must_use]
    pub fn with_updater_name(mut self, name: impl Into<String>) -> Self {
        self.updater_name = name.into();
        self
    }

    /// Directory for the host lock file.
    #[must_use]
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = dir.into();
        self
    }

    /// Decide what the host does at startup.
    ///
    /// `archive_location` is where updates are published; `main_exe` is the
    /// host's own executable file name inside the installed directory.
    /// Launch failures are logged and never stop the host.
    pub fn check(&self, archive_location: &str, main_exe: &str) -> HostCheck {
        let guard = match InstanceGuard::acquire(
            &self.lock_dir,
            self.layout.identity(),
            LockScope::Host,
        ) {
            Ok(guard) => guard,
            Err(e) => {
                debug!("Not the first host instance: {:#}", e);
                return HostCheck {
                    action: HostAction::ContinueAsUsual,
                    guard: None,
                };
            }
        };

        let action = if self.layout.is_ready() {
            let updater = self.layout.working_copy().join(&self.updater_name);
            let args = ["update".to_string(), main_exe.to_string()];
            match self.launcher.launch(&updater, &args) {
                Ok(()) => {
                    info!("Handed off to {} to install the staged update", updater.display());
                    HostAction::ExitNow
                }
                Err(e) => {
                    warn!("Failed to start the update: {:#}", e);
                    HostAction::ContinueAsUsual
                }
            }
        } else {
            let updater = self.layout.installed().join(&self.updater_name);
            let args = ["download".to_string(), archive_location.to_string()];
            if let Err(e) = self.launcher.launch(&updater, &args) {
                warn!("Failed to start the update check: {:#}", e);
            }
            HostAction::ContinueAsUsual
        };

        HostCheck {
            action,
            guard: Some(guard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InstallFixture, RecordingLauncher};

    const URL: &str = "https://updates.acme.test/widget.zip";

    #[test]
    fn test_no_stage_starts_background_download() {
        let fixture = InstallFixture::new("Acme", "Widget");
        let launcher = RecordingLauncher::new();

        let check = HostUpdater::new(fixture.layout().clone(), &launcher)
            .with_updater_name("stagehand")
            .with_lock_dir(fixture.lock_dir())
            .check(URL, "widget.exe");

        assert_eq!(check.action, HostAction::ContinueAsUsual);
        assert!(check.guard.is_some());
        assert_eq!(
            launcher.launches(),
            vec![(
                fixture.layout().installed().join("stagehand"),
                vec!["download".to_string(), URL.to_string()]
            )]
        );
    }

    #[test]
    fn test_ready_stage_hands_off_and_exits() {
        let fixture = InstallFixture::new("Acme", "Widget");
        fixture.stage(&[("widget.exe", "v2")]);
        let launcher = RecordingLauncher::new();

        let check = HostUpdater::new(fixture.layout().clone(), &launcher)
            .with_updater_name("stagehand")
            .with_lock_dir(fixture.lock_dir())
            .check(URL, "widget.exe");

        assert_eq!(check.action, HostAction::ExitNow);
        assert_eq!(
            launcher.launches(),
            vec![(
                fixture.layout().working_copy().join("stagehand"),
                vec!["update".to_string(), "widget.exe".to_string()]
            )]
        );
    }

    #[test]
    fn test_failed_handoff_keeps_running() {
        let fixture = InstallFixture::new("Acme", "Widget");
        fixture.stage(&[("widget.exe", "v2")]);
        let launcher = RecordingLauncher::failing();

        let check = HostUpdater::new(fixture.layout().clone(), &launcher)
            .with_lock_dir(fixture.lock_dir())
            .check(URL, "widget.exe");

        assert_eq!(check.action, HostAction::ContinueAsUsual);
    }

    #[test]
    fn test_second_host_instance_does_nothing() {
        let fixture = InstallFixture::new("Acme", "Widget");
        fixture.stage(&[("widget.exe", "v2")]);
        let launcher = RecordingLauncher::new();
        let hook = HostUpdater::new(fixture.layout().clone(), &launcher)
            .with_lock_dir(fixture.lock_dir());

        let first = hook.check(URL, "widget.exe");
        assert_eq!(first.action, HostAction::ExitNow);

        let second = hook.check(URL, "widget.exe");
        assert_eq!(second.action, HostAction::ContinueAsUsual);
        assert!(second.guard.is_none());
        assert_eq!(launcher.launches().len(), 1);
    }
}
