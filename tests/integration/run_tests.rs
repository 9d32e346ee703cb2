use rotcheck::cli::{Commands, SummaryFormat, VerifyArgs};
use rotcheck::config::Config;
use rotcheck::error::ExitCode;
use rotcheck::verify::Outcome;
use rotcheck::{run_command, run_verify};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn config(work: &Path) -> Config {
    Config {
        store_path: work.join("db/store.sqlite"),
        cache_path: work.join("db/cache.sqlite"),
        log_dir: work.join("logs"),
        too_new_hours: 0,
        ..Config::default()
    }
}

fn verify_args() -> VerifyArgs {
    VerifyArgs {
        workers: Some(2),
        no_health_check: true,
        summary: SummaryFormat::Json,
    }
}

#[test]
fn test_clean_run_succeeds() {
    let work = TempDir::new().unwrap();
    let photos = TempDir::new().unwrap();
    let documents = TempDir::new().unwrap();
    fs::write(photos.path().join("img.jpg"), "jpeg").unwrap();
    fs::write(documents.path().join("cv.pdf"), "pdf").unwrap();
    let config = Config {
        immutable_paths: vec![photos.path().to_path_buf()],
        mutable_paths: vec![documents.path().to_path_buf()],
        ..config(work.path())
    };

    let code = run_command(&Commands::Verify(verify_args()), &config, true).unwrap();
    assert_eq!(code, ExitCode::Success);

    let latest = fs::read_to_string(work.path().join("logs/latest.txt")).unwrap();
    assert!(latest.contains("Totals:"));
    assert!(latest.contains("PASS: 2 files"));

    let second = run_verify(&config, &verify_args(), true).unwrap();
    assert!(second.healthy);
    assert_eq!(second.totals.get(Outcome::Skip), 2);
}

#[test]
fn test_failure_sets_exit_code() {
    let work = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    let path = archive.path().join("tape.img");
    fs::write(&path, "abc").unwrap();
    let config = Config {
        immutable_paths: vec![archive.path().to_path_buf()],
        // Re-check every run
        skip_window_days: 0,
        ..config(work.path())
    };
    assert_eq!(
        run_command(&Commands::Verify(verify_args()), &config, true).unwrap(),
        ExitCode::Success
    );

    fs::write(&path, "abcd").unwrap();
    filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let summary = run_verify(&config, &verify_args(), true).unwrap();
    assert!(!summary.healthy);
    assert!(!summary.errors_logged);
    assert_eq!(summary.totals.get(Outcome::Fail), 1);

    let latest = fs::read_to_string(work.path().join("logs/latest.txt")).unwrap();
    assert!(latest.contains("FAIL: Immutable file was modified"));
    assert!(!latest.contains("PASS: 1 files"));
}

#[test]
fn test_missing_root_is_an_error_run() {
    let work = TempDir::new().unwrap();
    let config = Config {
        mutable_paths: vec![work.path().join("not-mounted")],
        ..config(work.path())
    };

    let code = run_command(&Commands::Verify(verify_args()), &config, true).unwrap();
    assert_eq!(code, ExitCode::VerificationFailed);
    let latest = fs::read_to_string(work.path().join("logs/latest.txt")).unwrap();
    assert!(latest.contains("ERROR: "));
}

#[test]
fn test_unreachable_health_check_does_not_fail_run() {
    let work = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("a.txt"), "abc").unwrap();
    let config = Config {
        mutable_paths: vec![root.path().to_path_buf()],
        health_check_url: Some("http://127.0.0.1:9/ping".to_string()),
        ..config(work.path())
    };
    let args = VerifyArgs {
        no_health_check: false,
        ..verify_args()
    };

    let code = run_command(&Commands::Verify(args), &config, true).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_maintenance_commands() {
    let work = TempDir::new().unwrap();
    let config = config(work.path());
    let ids = work.path().join("ids.txt");
    fs::write(&ids, "deadbeef\n").unwrap();

    let code = run_command(
        &Commands::DeleteRecords(rotcheck::cli::DeleteRecordsArgs { ids_file: ids }),
        &config,
        true,
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);

    let code = run_command(
        &Commands::ClearCache(rotcheck::cli::ClearCacheArgs {
            path: work.path().join("never-verified.txt"),
        }),
        &config,
        true,
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);

    assert_eq!(
        run_command(&Commands::ShowConfig, &config, true).unwrap(),
        ExitCode::Success
    );
}

#[test]
fn test_fix_timestamp_without_baseline_fails() {
    let work = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let file = root.path().join("orphan.txt");
    fs::write(&file, "abc").unwrap();

    let err = run_command(
        &Commands::FixTimestamp(rotcheck::cli::FixTimestampArgs {
            file,
            root: root.path().to_path_buf(),
        }),
        &config(work.path()),
        true,
    )
    .unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert!(format!("{err:#}").contains("no baseline found"));
}
