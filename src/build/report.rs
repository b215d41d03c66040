//! Output size reporting.
//!
//! Walks the output root and records the raw and gzip-compressed size of
//! every file. Purely observational.

use crate::mode::BuildMode;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Size of a single output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSize {
    /// Path relative to the measured root
    pub path: PathBuf,
    pub size: u64,
    pub gzip: u64,
}

/// Sizes of every file below the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeReport {
    pub mode: BuildMode,
    /// Files sorted by path
    pub files: Vec<FileSize>,
}

impl SizeReport {
    /// Measure every file below `root`.
    ///
    /// A missing root produces an empty report.
    pub fn measure(root: &Path, mode: BuildMode) -> io::Result<Self> {
        let mut files = Vec::new();
        if root.is_dir() {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(io::Error::other)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let contents = std::fs::read(entry.path())?;
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                files.push(FileSize {
                    path: relative.to_path_buf(),
                    size: contents.len() as u64,
                    gzip: gzip_size(&contents)?,
                });
            }
        }
        Ok(Self { mode, files })
    }

    pub fn total(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn total_gzip(&self) -> u64 {
        self.files.iter().map(|f| f.gzip).sum()
    }

    /// Report title tagged with the build mode.
    pub fn title(&self) -> String {
        format!("{} mode build", self.mode.title())
    }
}

impl std::fmt::Display for SizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for file in &self.files {
            writeln!(
                f,
                "  {:<48} {:>10}  (gzip {})",
                file.path.display(),
                format_bytes(file.size),
                format_bytes(file.gzip)
            )?;
        }
        write!(
            f,
            "{} all files {} (gzipped {})",
            self.title(),
            format_bytes(self.total()),
            format_bytes(self.total_gzip())
        )
    }
}

/// Size of `data` after gzip compression at the default level.
pub fn gzip_size(data: &[u8]) -> io::Result<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?.len() as u64)
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} kB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
