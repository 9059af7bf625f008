//! Output-file availability and downloads
//!
//! Files live under `<results_dir>/<job_id>/results/<file>`. Job ids and file names
//! are single path components; anything containing a separator or `..` is treated
//! as absent.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Downloadable outputs of a job, with the id of their download option
pub const DOWNLOAD_FILES: [(&str, &str); 7] = [
    ("summary", "out.fermo.summary.txt"),
    ("abbrev", "out.fermo.abbrev.csv"),
    ("log", "out.fermo.log"),
    ("session", "out.fermo.session.json"),
    ("full", "out.fermo.full.csv"),
    ("mod_cosine", "out.fermo.modified_cosine.graphml"),
    ("ms2deepscore", "out.fermo.ms2deepscore.graphml"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOption {
    pub id: &'static str,
    pub file: &'static str,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn is_component(name: &str) -> bool {
    !name.is_empty() && name != "." && !name.contains("..") && !name.contains(['/', '\\'])
}

/// Location of a job output; `None` when either name is not a plain path component.
pub fn output_path(results_dir: &Path, job_id: &str, file: &str) -> Option<PathBuf> {
    if !is_component(job_id) || !is_component(file) {
        debug!("Rejected output path {}/{}", job_id, file);
        return None;
    }
    Some(results_dir.join(job_id).join("results").join(file))
}

/// Whether an output file exists; errors other than "not found" are logged.
pub fn check_file(results_dir: &Path, job_id: &str, file: &str) -> bool {
    let Some(path) = output_path(results_dir, job_id, file) else {
        return false;
    };
    match std::fs::metadata(&path) {
        Ok(meta) => meta.is_file(),
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not check {}: {}", path.display(), e);
            false
        }
    }
}

/// Contents of an output file, or `None` when it is absent or the name is rejected.
pub fn read_download(results_dir: &Path, job_id: &str, file: &str) -> Result<Option<Vec<u8>>> {
    if !check_file(results_dir, job_id, file) {
        return Ok(None);
    }
    let Some(path) = output_path(results_dir, job_id, file) else {
        return Ok(None);
    };
    let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(bytes))
}

/// Probe every known output; unavailable files become disabled options.
pub fn probe_downloads(results_dir: &Path, job_id: &str) -> Vec<DownloadOption> {
    DOWNLOAD_FILES
        .iter()
        .map(|&(id, file)| {
            let enabled = check_file(results_dir, job_id, file);
            DownloadOption {
                id,
                file,
                enabled,
                url: enabled.then(|| format!("/download/{}/{}", job_id, file)),
            }
        })
        .collect()
}
