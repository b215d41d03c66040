//! File streams flowing between pipeline stages.
//!
//! A stream is read from a base directory with [`FileStream::src`], passed
//! through a [`Pipeline`](crate::transforms::Pipeline), and written below
//! another directory with [`FileStream::dest`], preserving relative paths.

use crate::build::discover_files;
use crate::build::DiscoveryError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A single file travelling through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the stream base (also the output path below `dest`)
    pub relative: PathBuf,
    /// Absolute path the file was read from
    pub origin: PathBuf,
    pub contents: Vec<u8>,
    /// Source map JSON emitted next to the output as `<file>.map`
    pub source_map: Option<String>,
    pub modified: Option<SystemTime>,
}

impl SourceFile {
    /// Create an in-memory file.
    pub fn new(relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let relative = relative.into();
        Self {
            origin: relative.clone(),
            relative,
            contents: contents.into(),
            source_map: None,
            modified: None,
        }
    }

    /// Read a file below `base`.
    pub fn read(base: &Path, path: &Path) -> io::Result<Self> {
        let relative = path.strip_prefix(base).unwrap_or(path).to_path_buf();
        let contents = fs::read(path)?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        Ok(Self { relative, origin: path.to_path_buf(), contents, source_map: None, modified })
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.contents)
    }

    /// Lowercased file extension.
    pub fn extension(&self) -> Option<String> {
        self.relative.extension().map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Replace the extension of the output path.
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.relative.set_extension(ext);
        self
    }

    /// Output file name, used in `sourceMappingURL` comments.
    pub fn file_name(&self) -> String {
        self.relative.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

/// Options for reading a stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrcOptions {
    /// Let wildcards match dot files
    pub dot: bool,
    /// Only include files modified after this instant
    pub since: Option<SystemTime>,
}

/// Ordered sequence of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStream {
    files: Vec<SourceFile>,
    /// Matches left unread because they were not modified since the cutoff
    skipped: usize,
}

impl FileStream {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files, skipped: 0 }
    }

    /// Read every file matching `pattern` below `base`.
    ///
    /// With `since` set, the modification time is checked before a file is
    /// read; unchanged files are counted in [`FileStream::skipped`].
    pub fn src(base: &Path, pattern: &str, options: SrcOptions) -> Result<Self, StreamError> {
        let mut files = Vec::new();
        let mut skipped = 0;
        for path in discover_files(base, pattern, options.dot)? {
            if let Some(since) = options.since {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                if modified.is_some_and(|modified| modified <= since) {
                    skipped += 1;
                    continue;
                }
            }
            let file = SourceFile::read(base, &path)
                .map_err(|e| StreamError::Read(path.clone(), e))?;
            files.push(file);
        }
        Ok(Self { files, skipped })
    }

    /// Write every file below `out_dir`, returning the paths written.
    ///
    /// Files carrying a source map get a `<name>.map` sidecar.
    pub fn dest(&self, out_dir: &Path) -> Result<Vec<PathBuf>, StreamError> {
        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let target = out_dir.join(&file.relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| StreamError::Write(target.clone(), e))?;
            }
            fs::write(&target, &file.contents).map_err(|e| StreamError::Write(target.clone(), e))?;
            written.push(target.clone());

            if let Some(map) = &file.source_map {
                let map_path = map_path(&target);
                fs::write(&map_path, map).map_err(|e| StreamError::Write(map_path.clone(), e))?;
                written.push(map_path);
            }
        }
        Ok(written)
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<SourceFile> {
        self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Drop files rejected by `keep`.
    pub fn filter(self, keep: impl Fn(&SourceFile) -> bool) -> Self {
        let files = self.files.into_iter().filter(|f| keep(f)).collect();
        Self { files, skipped: self.skipped }
    }
}

/// Sidecar path for a source map: `main.css` → `main.css.map`.
pub fn map_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".map");
    PathBuf::from(name)
}

/// Filesystem failure while reading or writing a stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("Failed to read {}: {}", .0.display(), .1)]
    Read(PathBuf, io::Error),
    #[error("Failed to write {}: {}", .0.display(), .1)]
    Write(PathBuf, io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_src_preserves_relative_paths() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("assets/scripts")).unwrap();
        fs::write(temp.path().join("assets/scripts/main.js"), "let a = 1;").unwrap();

        let stream =
            FileStream::src(temp.path(), "assets/scripts/**/*.js", SrcOptions::default()).unwrap();
        assert_eq!(stream.len(), 1);
        assert_eq!(stream.files()[0].relative, PathBuf::from("assets/scripts/main.js"));
        assert_eq!(stream.files()[0].text().unwrap(), "let a = 1;");
        assert_eq!(stream.files()[0].extension().as_deref(), Some("js"));
    }

    #[test]
    fn test_src_since_filters_old_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("old.png"), "x").unwrap();

        let later = SystemTime::now() + Duration::from_secs(60);
        let options = SrcOptions { since: Some(later), ..SrcOptions::default() };
        let stream = FileStream::src(temp.path(), "*.png", options).unwrap();
        assert!(stream.is_empty());
        assert_eq!(stream.skipped(), 1);

        let earlier = SystemTime::UNIX_EPOCH;
        let options = SrcOptions { since: Some(earlier), ..SrcOptions::default() };
        let stream = FileStream::src(temp.path(), "*.png", options).unwrap();
        assert_eq!(stream.len(), 1);
        assert_eq!(stream.skipped(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_src_since_does_not_read_unchanged_files() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked.png");
        fs::write(&locked, "x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let later = SystemTime::now() + Duration::from_secs(60);
        let options = SrcOptions { since: Some(later), ..SrcOptions::default() };
        let stream = FileStream::src(temp.path(), "*.png", options).unwrap();
        assert!(stream.is_empty());
        assert_eq!(stream.skipped(), 1);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn test_dest_writes_files_and_maps() {
        let temp = TempDir::new().unwrap();
        let mut file = SourceFile::new("assets/styles/main.css", "body{}");
        file.source_map = Some("{\"version\":3}".to_string());
        let stream = FileStream::new(vec![file, SourceFile::new("index.html", "<p>")]);

        let written = stream.dest(temp.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(fs::read_to_string(temp.path().join("assets/styles/main.css")).unwrap(), "body{}");
        assert!(temp.path().join("assets/styles/main.css.map").exists());
        assert!(temp.path().join("index.html").exists());
    }

    #[test]
    fn test_with_extension_and_map_path() {
        let file = SourceFile::new("assets/styles/main.scss", "").with_extension("css");
        assert_eq!(file.relative, PathBuf::from("assets/styles/main.css"));
        assert_eq!(file.file_name(), "main.css");
        assert_eq!(map_path(Path::new("a/main.js")), PathBuf::from("a/main.js.map"));
    }
}
