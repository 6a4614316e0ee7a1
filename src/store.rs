use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use tempfile::Builder;

use crate::domain::PrimarySite;
use crate::error::GdcError;

pub const REPORT_PREFIX: &str = "frequent-mutations";
pub const PROGRESS_FILE: &str = "progress.json";

/// On-disk layout of one site's outputs under the output root.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    site_dir: Utf8PathBuf,
}

impl SiteLayout {
    pub fn new(output_root: &Utf8Path, site: &PrimarySite) -> Self {
        Self {
            site_dir: output_root.join(site.dir_name()),
        }
    }

    pub fn site_dir(&self) -> &Utf8Path {
        &self.site_dir
    }

    pub fn report_path(&self, date: NaiveDate) -> Utf8PathBuf {
        self.site_dir
            .join(format!("{REPORT_PREFIX}.{}.tsv", date.format("%Y-%m-%d")))
    }

    pub fn progress_path(&self) -> Utf8PathBuf {
        self.site_dir.join(PROGRESS_FILE)
    }

    /// Whether a previous run already left a report in the site directory.
    pub fn has_report(&self) -> Result<bool, GdcError> {
        if !self.site_dir.as_std_path().is_dir() {
            return Ok(false);
        }
        let entries = fs::read_dir(self.site_dir.as_std_path())
            .map_err(|err| GdcError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| GdcError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_file() && path.extension().map(|ext| ext == "tsv").unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Writes `content` to a temp file next to `path` and renames it into place.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), GdcError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path()).map_err(|err| GdcError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".gdc-fm")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GdcError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| GdcError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| GdcError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| GdcError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn remove_if_exists(path: &Utf8Path) -> Result<(), GdcError> {
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path()).map_err(|err| GdcError::Filesystem(err.to_string()))?;
    }
    Ok(())
}
