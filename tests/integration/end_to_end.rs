use crate::common::{Publisher, tree};
use stagehand::core::UpdateError;
use stagehand::download::{DownloadOutcome, Downloader};
use stagehand::fetch::{ArchiveHash, FileSource};
use stagehand::orchestrator::{UpdateOrchestrator, UpdateState};
use stagehand::test_utils::{
    InstallFixture, RecordingLauncher, ZipEntry, build_zip, bzip2_compress, init_test_logging,
};
use std::time::Duration;

const MAIN: &str = "widget.exe";

fn downloader(fixture: &InstallFixture) -> Downloader<'_> {
    Downloader::new(fixture.layout(), &FileSource, "stagehand", fixture.updater_exe())
}

fn v2_archive() -> Vec<u8> {
    build_zip(&[ZipEntry::file(MAIN, b"widget v2"), ZipEntry::file("data.bin", b"data v2")])
}

#[test]
fn test_download_then_update_promotes_new_version() {
    init_test_logging(None);
    let fixture = InstallFixture::new("Acme", "Widget");
    fixture.install(&[(MAIN, "widget v1"), ("old.dll", "v1")]);
    let zip = v2_archive();
    let location = Publisher::new(&fixture.root().join("server")).publish("widget.zip", &zip);
    let layout = fixture.layout();

    let outcome = downloader(&fixture).run(&location).unwrap();
    assert_eq!(
        outcome,
        DownloadOutcome::Staged {
            hash: ArchiveHash::compute(&zip),
            files: 2,
        }
    );
    assert!(layout.is_ready());
    assert!(layout.working_copy().join("stagehand").is_file());
    // Nothing in the installation changes until update runs
    assert_eq!(tree(layout.installed()), vec!["old.dll", MAIN]);

    let launcher = RecordingLauncher::new();
    let report = UpdateOrchestrator::new(layout, &launcher, Duration::from_secs(1))
        .run(MAIN)
        .unwrap();

    assert_eq!(report.state, UpdateState::Done);
    assert_eq!(
        tree(layout.installed()),
        vec!["data.bin", "stagehand", "stagehand.this.sha256", MAIN]
    );
    assert_eq!(std::fs::read_to_string(layout.installed_exe(MAIN)).unwrap(), "widget v2");
    assert_eq!(
        ArchiveHash::read_marker(&layout.installed_hash_marker()),
        Some(ArchiveHash::compute(&zip))
    );
    assert!(!layout.staged().exists());
    assert_eq!(launcher.launches(), vec![(layout.installed_exe(MAIN), vec![])]);

    // The installation now carries the published hash
    assert_eq!(downloader(&fixture).run(&location).unwrap(), DownloadOutcome::NoUpdateAvailable);
    assert!(!layout.staged().exists());
}

#[test]
fn test_next_release_after_promotion_is_staged() {
    let fixture = InstallFixture::new("Acme", "Widget");
    fixture.install(&[(MAIN, "widget v1")]);
    let publisher = Publisher::new(&fixture.root().join("server"));
    let launcher = RecordingLauncher::new();

    let location = publisher.publish("widget.zip", &v2_archive());
    downloader(&fixture).run(&location).unwrap();
    UpdateOrchestrator::new(fixture.layout(), &launcher, Duration::from_secs(1))
        .run(MAIN)
        .unwrap();

    let v3 = build_zip(&[ZipEntry::file(MAIN, b"widget v3")]);
    publisher.publish("widget.zip", &v3);
    let outcome = downloader(&fixture).run(&location).unwrap();
    assert!(matches!(outcome, DownloadOutcome::Staged { .. }));

    UpdateOrchestrator::new(fixture.layout(), &launcher, Duration::from_secs(1))
        .run(MAIN)
        .unwrap();
    assert_eq!(
        tree(fixture.layout().installed()),
        vec!["stagehand", "stagehand.this.sha256", MAIN]
    );
    assert_eq!(
        std::fs::read_to_string(fixture.layout().installed_exe(MAIN)).unwrap(),
        "widget v3"
    );
}

#[test]
fn test_bzip2_archive_end_to_end() {
    let fixture = InstallFixture::new("Acme", "Widget");
    fixture.install(&[(MAIN, "widget v1")]);
    let compressed = bzip2_compress(&v2_archive());
    let location =
        Publisher::new(&fixture.root().join("server")).publish("widget.zip.bz2", &compressed);

    let outcome = downloader(&fixture).run(&location).unwrap();
    match outcome {
        DownloadOutcome::Staged {
            hash,
            files,
        } => {
            // The published hash covers the compressed bytes
            assert_eq!(hash, ArchiveHash::compute(&compressed));
            assert_eq!(files, 2);
        }
        other => panic!("expected a new stage, got {other:?}"),
    }
    assert_eq!(
        std::fs::read_to_string(fixture.layout().staged().join(MAIN)).unwrap(),
        "widget v2"
    );
}

#[test]
fn test_tampered_archive_never_reaches_staging() {
    let fixture = InstallFixture::new("Acme", "Widget");
    fixture.install(&[(MAIN, "widget v1")]);
    let publisher = Publisher::new(&fixture.root().join("server"));
    let zip = v2_archive();
    let location = publisher.publish("widget.zip", &zip);

    let mut tampered = zip.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xff;
    publisher.tamper("widget.zip", &tampered);

    let err = downloader(&fixture).run(&location).unwrap_err();
    assert!(matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::HashMismatch { .. })));
    assert!(!fixture.layout().staged().exists());
    assert!(!fixture.layout().working_copy().exists());
    assert_eq!(tree(fixture.layout().installed()), vec![MAIN]);
}

#[test]
fn test_repeated_download_is_a_noop() {
    let fixture = InstallFixture::new("Acme", "Widget");
    let publisher = Publisher::new(&fixture.root().join("server"));
    let location = publisher.publish("widget.zip", &v2_archive());

    assert!(!downloader(&fixture).run(&location).unwrap().is_noop());
    let staged_before = tree(fixture.layout().staged());

    // Even a newer release is ignored while a stage is waiting
    publisher.publish("widget.zip", &build_zip(&[ZipEntry::file(MAIN, b"widget v3")]));
    let second = downloader(&fixture).run(&location).unwrap();

    assert_eq!(second, DownloadOutcome::AlreadyStaged);
    assert_eq!(tree(fixture.layout().staged()), staged_before);
    assert_eq!(
        std::fs::read_to_string(fixture.layout().staged().join(MAIN)).unwrap(),
        "widget v2"
    );
}

#[test]
fn test_unreachable_server_is_transport_error() {
    let fixture = InstallFixture::new("Acme", "Widget");
    let location = fixture.root().join("server").join("missing.zip");

    let err = downloader(&fixture).run(location.to_str().unwrap()).unwrap_err();
    assert!(matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::Transport { .. })));
    assert!(!fixture.layout().staged().exists());
}
