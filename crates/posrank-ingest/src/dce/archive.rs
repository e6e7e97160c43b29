//! Download artifacts for DCE batch exports.
//!
//! The fetcher writes each day's zip to the download directory; the
//! normalizer extracts it into `{extract_dir}/{archive name}/`, reads every
//! file, and the [`Scratch`] guard removes both the archive and the
//! extraction directory when it goes out of scope.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use posrank_core::error::RankError;
use tracing::{debug, warn};

/// `{download_dir}/{YYYYMMDD}_DCE_DPL.zip`
pub fn archive_path(download_dir: &Path, date: NaiveDate) -> PathBuf {
    download_dir.join(format!("{}_DCE_DPL.zip", date.format("%Y%m%d")))
}

/// Persist a downloaded archive, creating the directory on demand.
pub fn save(download_dir: &Path, date: NaiveDate, body: &[u8]) -> Result<PathBuf, RankError> {
    fs::create_dir_all(download_dir)
        .map_err(|e| RankError::Archive(format!("create {}: {e}", download_dir.display())))?;
    let path = archive_path(download_dir, date);
    fs::write(&path, body).map_err(|e| RankError::Archive(format!("write {}: {e}", path.display())))?;
    Ok(path)
}

/// Owns an archive and its extraction directory for the duration of one
/// normalization.
pub struct Scratch {
    archive: PathBuf,
    dir: PathBuf,
}

impl Scratch {
    /// Extract `archive` under `extract_root`. The returned guard cleans up
    /// even when extraction itself fails part way.
    pub fn extract(archive: &Path, extract_root: &Path) -> Result<(Self, Vec<PathBuf>), RankError> {
        let name = archive
            .file_name()
            .ok_or_else(|| RankError::Archive(format!("{} has no file name", archive.display())))?;
        let scratch = Self { archive: archive.to_path_buf(), dir: extract_root.join(name) };

        let file = fs::File::open(archive).map_err(|e| RankError::Archive(format!("open {}: {e}", archive.display())))?;
        let mut zip =
            zip::ZipArchive::new(file).map_err(|e| RankError::Archive(format!("read {}: {e}", archive.display())))?;
        fs::create_dir_all(&scratch.dir)
            .map_err(|e| RankError::Archive(format!("create {}: {e}", scratch.dir.display())))?;
        zip.extract(&scratch.dir).map_err(|e| RankError::Archive(format!("extract {}: {e}", archive.display())))?;

        let mut files = Vec::new();
        collect_files(&scratch.dir, &mut files)
            .map_err(|e| RankError::Archive(format!("list {}: {e}", scratch.dir.display())))?;
        files.sort();
        Ok((scratch, files))
    }

    #[cfg(test)]
    fn dir(&self) -> &Path {
        &self.dir
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

impl Drop for Scratch {
    fn drop(&mut self) {
        remove_quietly(fs::remove_dir_all(&self.dir), &self.dir);
        remove_quietly(fs::remove_file(&self.archive), &self.archive);
        debug!("[dce] cleaned up {}", self.archive.display());
    }
}

fn remove_quietly(result: io::Result<()>, path: &Path) {
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => warn!("[dce] failed to remove {}: {e}", path.display()),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Text decoding
// ---------------------------------------------------------------------------

/// Which decoder produced a file's text. Field separators differ: UTF-8
/// exports are tab-separated, GBK exports are space-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Gbk,
}

/// Decode as UTF-8, falling back to GBK.
pub fn decode(bytes: &[u8]) -> Result<(String, TextEncoding), RankError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok((text.trim_start_matches('\u{feff}').to_string(), TextEncoding::Utf8));
    }
    let (text, _, had_errors) = encoding_rs::GBK.decode(bytes);
    if had_errors {
        return Err(RankError::Encoding("neither UTF-8 nor GBK".into()));
    }
    Ok((text.into_owned(), TextEncoding::Gbk))
}
