//! Per-run working directory, retention of old runs and the public report URL.

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use thiserror::Error;

use crate::warnings::WarningLog;

pub const REPORTS_DIR: &str = "reports";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `reports/<YYYYmmdd_HHMMSS>/` with its `pdfs`, `lyrx`, `json` and feature store folders.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    root: PathBuf,
    run_dir: PathBuf,
    gdb_name: String,
    output_dir: PathBuf,
}

impl RunWorkspace {
    pub fn initialize(root: impl Into<PathBuf>, gdb_name: &str, output_dir: Option<&Path>) -> Result<Self, WorkspaceError> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        Self::initialize_named(root, &stamp, gdb_name, output_dir)
    }

    pub fn initialize_named(
        root: impl Into<PathBuf>,
        run_name: &str,
        gdb_name: &str,
        output_dir: Option<&Path>,
    ) -> Result<Self, WorkspaceError> {
        let root = root.into();
        let run_dir = root.join(REPORTS_DIR).join(run_name);

        let mut workspace = Self {
            root,
            run_dir: run_dir.clone(),
            gdb_name: gdb_name.to_string(),
            output_dir: run_dir,
        };
        for dir in [
            workspace.pdfs_dir(),
            workspace.lyrx_dir(),
            workspace.json_dir(),
            workspace.store_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|source| WorkspaceError::Create { path: dir, source })?;
        }
        workspace.output_dir = resolve_output_dir(output_dir, &workspace.run_dir);

        log::info!("Report workspace: {}", workspace.run_dir.display());
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn pdfs_dir(&self) -> PathBuf {
        self.run_dir.join("pdfs")
    }

    pub fn lyrx_dir(&self) -> PathBuf {
        self.run_dir.join("lyrx")
    }

    pub fn json_dir(&self) -> PathBuf {
        self.run_dir.join("json")
    }

    /// Feature-cache store, `<gdb_name>.gdb`.
    pub fn store_dir(&self) -> PathBuf {
        self.run_dir.join(format!("{}.gdb", self.gdb_name))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the page artifact for `name` is written.
    pub fn page_path(&self, name: &str) -> PathBuf {
        let file = sanitize_filename::sanitize(format!("{}.pdf", name));
        self.pdfs_dir().join(file)
    }

    pub fn report_path(&self, report_filename: &str) -> PathBuf {
        let file = sanitize_filename::sanitize(format!("{}.pdf", report_filename));
        self.output_dir.join(file)
    }
}

/// The configured output directory, unless it is unset or is a `.gdb` store.
fn resolve_output_dir(configured: Option<&Path>, run_dir: &Path) -> PathBuf {
    match configured {
        Some(dir) if !dir.as_os_str().is_empty() => {
            let is_gdb = dir
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gdb"));
            if is_gdb {
                run_dir.to_path_buf()
            } else {
                dir.to_path_buf()
            }
        }
        _ => run_dir.to_path_buf(),
    }
}

/// Keep the newest `keep` run directories under `<root>/reports`, oldest removed first.
///
/// Returns the removed directories. A directory that cannot be removed is a warning.
pub fn clean_old_runs(root: &Path, keep: usize, warnings: &mut WarningLog) -> Result<Vec<PathBuf>, WorkspaceError> {
    let reports = root.join(REPORTS_DIR);
    let entries = fs::read_dir(&reports).map_err(|source| WorkspaceError::List {
        path: reports.clone(),
        source,
    })?;

    let mut runs: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .filter(|entry| !entry.file_name().to_string_lossy().contains('.'))
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|meta| meta.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .collect();

    if runs.len() <= keep {
        return Ok(Vec::new());
    }

    runs.sort();
    let excess = runs.len() - keep;
    let mut removed = Vec::new();
    for (_, dir) in runs.into_iter().take(excess) {
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                log::info!("Removed old report folder {}", dir.display());
                removed.push(dir);
            }
            Err(err) => warnings.add(format!(
                "{}: this folder is currently being used and could not be deleted ({})",
                dir.display(),
                err
            )),
        }
    }
    Ok(removed)
}

/// Public URL of a report: the first two path segments of `report_path`
/// (drive or root, then the server folder) become `{external_url}/rest`,
/// and every separator becomes `/`.
pub fn external_report_url(report_path: &Path, external_url: &str) -> String {
    let normalized = report_path.to_string_lossy().replace('\\', "/");
    let rest = normalized.split('/').skip(2).collect::<Vec<_>>().join("/");
    let base = format!("{}/rest", external_url.trim_end_matches('/'));
    if rest.is_empty() {
        base
    } else {
        format!("{}/{}", base, rest)
    }
}
