//! Staged output files of one export.
//!
//! Every stage of the pipeline writes into named in-memory buffers keyed by
//! their path relative to the output directory. Asking for the same path twice
//! yields the same buffer, so several stages can append to one logical file.
//! Nothing touches the disk until [`FileManifest::flush`] is called, which the
//! pipeline only does after every stage succeeded.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// How a staged buffer is committed to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Create or truncate the target.
    #[default]
    Write,
    /// Append to whatever the target already holds.
    Append,
}

/// One staged file. Implements [`Write`] by appending to its buffer.
#[derive(Debug, Default)]
pub struct StagedFile {
    mode: OpenMode,
    data: Vec<u8>,
}

impl StagedFile {
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overwrite bytes starting at `offset`, growing the buffer if needed.
    ///
    /// Used to fill reserved header lines whose content is only known once
    /// later stages have run.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, b' ');
        }
        self.data[offset..end].copy_from_slice(bytes);
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FileManifest {
    files: BTreeMap<PathBuf, StagedFile>,
}

impl FileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Staged buffer for `path`, created in [`OpenMode::Write`] on first use.
    pub fn file<P: AsRef<Path>>(&mut self, path: P) -> &mut StagedFile {
        self.file_with_mode(path, OpenMode::Write)
    }

    /// Staged buffer for `path`. The mode only applies when the entry is new.
    pub fn file_with_mode<P: AsRef<Path>>(&mut self, path: P, mode: OpenMode) -> &mut StagedFile {
        self.files
            .entry(path.as_ref().to_path_buf())
            .or_insert_with(|| StagedFile { mode, data: Vec::new() })
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&StagedFile> {
        self.files.get(path.as_ref())
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.files.contains_key(path.as_ref())
    }

    /// Relative paths of every staged file, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every staged file below `dir`, creating parent directories.
    ///
    /// Returns the relative paths written.
    pub fn flush(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());
        for (relative, staged) in &self.files {
            let target = dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = match staged.mode {
                OpenMode::Write  => OpenOptions::new().write(true).create(true).truncate(true).open(&target)?,
                OpenMode::Append => OpenOptions::new().append(true).create(true).open(&target)?,
            };
            file.write_all(&staged.data)?;
            file.flush()?;
            debug!("Wrote {} ({} B)", relative.display(), staged.data.len());
            written.push(relative.clone());
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_resolves_to_same_buffer() {
        let mut manifest = FileManifest::new();
        write!(manifest.file("presolver/the.supre"), "a\n").unwrap();
        write!(manifest.file("presolver/the.supre"), "b\n").unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("presolver/the.supre").unwrap().bytes(), b"a\nb\n");
    }

    #[test]
    fn patch_overwrites_reserved_space() {
        let mut staged = StagedFile::default();
        staged.write_all(b"          \nrest\n").unwrap();
        staged.patch(0, b"12 3");
        assert_eq!(staged.bytes(), b"12 3      \nrest\n");
    }

    #[test]
    fn flush_creates_directories_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("log.txt"), b"old\n").unwrap();

        let mut manifest = FileManifest::new();
        manifest.file("nested/a.txt").write_all(b"x").unwrap();
        manifest.file_with_mode("log.txt", OpenMode::Append).write_all(b"new\n").unwrap();
        manifest.flush(dir.path()).unwrap();

        assert_eq!(fs::read(dir.path().join("nested/a.txt")).unwrap(), b"x");
        assert_eq!(fs::read(dir.path().join("log.txt")).unwrap(), b"old\nnew\n");
    }
}
