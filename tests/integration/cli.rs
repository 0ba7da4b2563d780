use crate::common::{Publisher, tree};
use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use stagehand::guard::{InstanceGuard, LockScope};
use stagehand::layout::{AppIdentity, AppLayout};
use stagehand::test_utils::{ZipEntry, build_zip};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// Serial: a concurrent fork can inherit a write handle to a freshly copied binary (ETXTBSY)

/// The compiled updater copied into `<root>/Acme/<dir>/`, as an installer would place it.
struct InstalledUpdater {
    temp: TempDir,
    layout: AppLayout,
}

impl InstalledUpdater {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let vendor = temp.path().join("Acme");
        let layout = AppLayout::new(&vendor, "Widget").unwrap();
        std::fs::create_dir_all(layout.installed()).unwrap();

        let locks = temp.path().join("locks");
        std::fs::write(
            vendor.join("stagehand.toml"),
            format!(
                "recreate_delay_ms = 0\nhandle_release_delay_ms = 0\nupdater_exe_name = '{}'\nlock_dir = '{}'\n",
                exe_name(),
                locks.display()
            ),
        )
        .unwrap();

        let installed = Self {
            temp,
            layout,
        };
        installed.copy_binary_into(installed.layout.installed());
        installed
    }

    fn copy_binary_into(&self, dir: &Path) -> PathBuf {
        let built = assert_cmd::cargo::cargo_bin("stagehand");
        let target = dir.join(exe_name());
        std::fs::create_dir_all(dir).unwrap();
        std::fs::copy(built, &target).unwrap();
        target
    }

    fn command_in(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(dir.join(exe_name()));
        cmd.env_remove("STAGEHAND_CONFIG")
            .env_remove("STAGEHAND_DISABLE_TIMEOUT_MS")
            .env_remove("STAGEHAND_LOG_LEVEL")
            .env_remove("RUST_LOG");
        cmd
    }

    fn lock_dir(&self) -> PathBuf {
        self.temp.path().join("locks")
    }

    fn log(&self) -> String {
        std::fs::read_to_string(self.layout.vendor_dir().join("stagehand.log")).unwrap_or_default()
    }
}

fn exe_name() -> String {
    format!("stagehand{}", std::env::consts::EXE_SUFFIX)
}

#[test]
#[serial]
fn test_no_arguments_prints_usage() {
    Command::cargo_bin("stagehand")
        .unwrap()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
#[serial]
fn test_missing_operand_prints_usage() {
    Command::cargo_bin("stagehand")
        .unwrap()
        .arg("download")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
#[serial]
fn test_unknown_command_is_rejected() {
    Command::cargo_bin("stagehand").unwrap().args(["install", "x"]).assert().code(2);
}

#[test]
#[serial]
fn test_download_stages_update() {
    let app = InstalledUpdater::new();
    let zip = build_zip(&[ZipEntry::file("widget.exe", b"v2")]);
    let location = Publisher::new(&app.temp.path().join("server")).publish("widget.zip", &zip);

    app.command_in(app.layout.installed()).args(["download", &location]).assert().success();

    assert!(app.layout.is_ready());
    assert!(app.layout.working_copy().join(exe_name()).is_file());
    let mut expected = vec![
        exe_name(),
        "stagehand.this.sha256".to_string(),
        "update.ready".to_string(),
        "widget.exe".to_string(),
    ];
    expected.sort();
    assert_eq!(tree(app.layout.staged()), expected);
    assert!(app.log().contains("Staged update"), "log was: {}", app.log());

    // Second run: already staged, still exit 0
    app.command_in(app.layout.installed()).args(["download", &location]).assert().success();
}

#[test]
#[serial]
fn test_download_failure_exits_one_and_logs() {
    let app = InstalledUpdater::new();
    let missing = app.temp.path().join("server").join("missing.zip");

    app.command_in(app.layout.installed())
        .args(["download", missing.to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to fetch"));

    assert!(!app.layout.staged().exists());
    assert!(app.log().contains("ERROR"), "log was: {}", app.log());
}

#[test]
#[serial]
fn test_second_instance_is_refused() {
    let app = InstalledUpdater::new();
    let _held = InstanceGuard::acquire(
        &app.lock_dir(),
        &AppIdentity::new("Acme", "Widget"),
        LockScope::Runner,
    )
    .unwrap();

    app.command_in(app.layout.installed())
        .args(["download", "https://updates.acme.test/widget.zip"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already running"));
}

#[test]
#[serial]
fn test_update_without_stage_fails_cleanly() {
    let app = InstalledUpdater::new();
    std::fs::write(app.layout.installed().join("widget.exe"), b"v1").unwrap();
    let working_copy = app.layout.working_copy().to_path_buf();
    app.copy_binary_into(&working_copy);

    app.command_in(&working_copy)
        .args(["update", "widget.exe"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No staged update"));

    assert_eq!(std::fs::read(app.layout.installed().join("widget.exe")).unwrap(), b"v1");
}

#[cfg(unix)]
#[test]
#[serial]
fn test_download_then_update_through_the_binary() {
    let app = InstalledUpdater::new();
    std::fs::write(app.layout.installed().join("widget"), "#!/bin/sh\nexit 0\n").unwrap();
    let zip = build_zip(&[
        ZipEntry::file("widget", b"#!/bin/sh\n# v2\nexit 0\n").mode(0o755),
        ZipEntry::file("readme.txt", b"v2"),
    ]);
    let location = Publisher::new(&app.temp.path().join("server")).publish("widget.zip", &zip);

    app.command_in(app.layout.installed()).args(["download", &location]).assert().success();
    app.command_in(app.layout.working_copy()).args(["update", "widget"]).assert().success();

    let installed = app.layout.installed();
    let mut expected =
        vec![exe_name(), "readme.txt".into(), "stagehand.this.sha256".into(), "widget".into()];
    expected.sort();
    assert_eq!(tree(installed), expected);
    assert!(std::fs::read_to_string(installed.join("widget")).unwrap().contains("# v2"));
    assert!(!app.layout.staged().exists());

    // The archive did not ship the updater; the staged copy of the running one was promoted
    assert!(installed.join(exe_name()).is_file());
    app.command_in(installed).args(["download", &location]).assert().success();
    assert!(!app.layout.staged().exists());
}
