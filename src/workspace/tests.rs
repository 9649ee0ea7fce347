use std::fs;
use std::path::Path;

use tempfile::tempdir;

use super::*;

#[test]
fn test_initialize_creates_run_layout() {
    let root = tempdir().unwrap();
    let workspace = RunWorkspace::initialize_named(root.path(), "20240101_120000", "cache", None).unwrap();

    let run_dir = root.path().join("reports").join("20240101_120000");
    assert_eq!(workspace.run_dir(), run_dir);
    for dir in ["pdfs", "lyrx", "json", "cache.gdb"] {
        assert!(run_dir.join(dir).is_dir(), "{} missing", dir);
    }
    assert_eq!(workspace.output_dir(), run_dir);
    assert_eq!(workspace.page_path("Zoning_1"), run_dir.join("pdfs").join("Zoning_1.pdf"));
}

#[test]
fn test_initialize_uses_timestamp_name() {
    let root = tempdir().unwrap();
    let workspace = RunWorkspace::initialize(root.path(), "cache", None).unwrap();

    let name = workspace.run_dir().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name.len(), "YYYYmmdd_HHMMSS".len());
    assert_eq!(&name[8..9], "_");
}

#[test]
fn test_output_dir_falls_back_for_gdb_targets() {
    let root = tempdir().unwrap();
    let out = root.path().join("out");

    let custom = RunWorkspace::initialize_named(root.path(), "a", "cache", Some(&out)).unwrap();
    assert_eq!(custom.output_dir(), out.as_path());
    assert_eq!(custom.report_path("Final Report"), out.join("Final Report.pdf"));

    let gdb = root.path().join("scratch.gdb");
    let fallback = RunWorkspace::initialize_named(root.path(), "b", "cache", Some(&gdb)).unwrap();
    assert_eq!(fallback.output_dir(), fallback.run_dir());
}

#[test]
fn test_clean_old_runs_keeps_newest() {
    let root = tempdir().unwrap();
    for name in ["20240101_000000", "20240102_000000", "20240103_000000", "20240104_000000"] {
        fs::create_dir_all(root.path().join("reports").join(name)).unwrap();
    }
    fs::write(root.path().join("reports").join("notes.txt"), "keep me").unwrap();
    let mut warnings = WarningLog::new();

    let removed = clean_old_runs(root.path(), 2, &mut warnings).unwrap();

    assert_eq!(removed.len(), 2);
    assert!(warnings.is_empty());
    let reports = root.path().join("reports");
    assert!(reports.join("notes.txt").exists());
    let remaining = fs::read_dir(&reports)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .count();
    assert_eq!(remaining, 2);
}

#[test]
fn test_clean_old_runs_under_limit_is_noop() {
    let root = tempdir().unwrap();
    fs::create_dir_all(root.path().join("reports").join("20240101_000000")).unwrap();

    let removed = clean_old_runs(root.path(), 5, &mut WarningLog::new()).unwrap();
    assert!(removed.is_empty());
}

#[test]
fn test_clean_old_runs_requires_reports_dir() {
    let root = tempdir().unwrap();
    assert!(matches!(
        clean_old_runs(root.path(), 1, &mut WarningLog::new()),
        Err(WorkspaceError::List { .. })
    ));
}

#[test]
fn test_external_report_url() {
    assert_eq!(
        external_report_url(
            Path::new(r"D:\arcgisserver\directories\arcgisjobs\job1\report.pdf"),
            "https://gis.example.com/server/"
        ),
        "https://gis.example.com/server/rest/directories/arcgisjobs/job1/report.pdf"
    );
    assert_eq!(
        external_report_url(Path::new("/arcgisserver/directories/report.pdf"), "https://gis.example.com"),
        "https://gis.example.com/rest/directories/report.pdf"
    );
}
