use crate::cipher::aead::Cipher;
use crate::common::{FaceLockError, Result};
use crate::vault::KeyHandle;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Protect,
    Unprotect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Protect => write!(f, "protect"),
            Operation::Unprotect => write!(f, "unprotect"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authenticity,
    KeyNotFound,
    KeyCorrupt,
    Io,
    Cipher,
}

impl FailureKind {
    pub fn classify(err: &FaceLockError) -> Self {
        match err {
            FaceLockError::Authenticity => FailureKind::Authenticity,
            FaceLockError::KeyNotFound(_) => FailureKind::KeyNotFound,
            FaceLockError::KeyCorrupt { .. } => FailureKind::KeyCorrupt,
            FaceLockError::Io(_) | FaceLockError::Storage(_) | FaceLockError::Image(_) => {
                FailureKind::Io
            }
            _ => FailureKind::Cipher,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one protect/unprotect call: which paths were transformed,
/// which failed and why, and which subtrees were left out of the walk.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub operation: Operation,
    pub root: PathBuf,
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
    pub skipped: Vec<PathBuf>,
}

impl Report {
    fn new(operation: Operation, root: &Path) -> Self {
        Self {
            operation,
            root: root.to_path_buf(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn record_failure(&mut self, path: PathBuf, err: &FaceLockError) {
        tracing::warn!("{} failed for {}: {}", self.operation, path.display(), err);
        self.failed.push(FileFailure {
            path,
            kind: FailureKind::classify(err),
            message: err.to_string(),
        });
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies a cipher in place to a file or to every regular file under a
/// directory.
///
/// Each file is rewritten through a temporary sibling and an atomic rename,
/// so a crash leaves either the old or the new content. In a directory, a
/// failing file is recorded and the walk carries on; nothing already
/// rewritten is touched again.
///
/// Excluded directories are never rewritten: a target inside one is refused
/// and a walk that reaches one prunes it.
pub struct CipherEngine<C: Cipher> {
    cipher: C,
    excluded: Vec<PathBuf>,
}

impl<C: Cipher> CipherEngine<C> {
    pub fn new(cipher: C) -> Self {
        Self { cipher, excluded: Vec::new() }
    }

    /// Keep `dir` and everything below it out of reach. `dir` must exist.
    pub fn excluding(mut self, dir: &Path) -> Result<Self> {
        self.excluded.push(fs::canonicalize(dir)?);
        Ok(self)
    }

    pub fn protect(&self, path: &Path, key: &KeyHandle) -> Result<Report> {
        self.run(Operation::Protect, path, key)
    }

    pub fn unprotect(&self, path: &Path, key: &KeyHandle) -> Result<Report> {
        self.run(Operation::Unprotect, path, key)
    }

    /// Report every regular file under `path` as failed with `err`, without
    /// touching any of them. Used when no key can be produced for a
    /// directory target.
    pub fn fail_all(&self, operation: Operation, path: &Path, err: &FaceLockError) -> Result<Report> {
        let canonical = self.guard(path)?;
        let mut report = Report::new(operation, path);
        for file in self.collect_files(path, &canonical, &mut report) {
            report.record_failure(file, err);
        }
        Ok(report)
    }

    fn run(&self, operation: Operation, path: &Path, key: &KeyHandle) -> Result<Report> {
        let meta = fs::symlink_metadata(path)?;
        let canonical = self.guard(path)?;
        let mut report = Report::new(operation, path);

        if meta.is_dir() {
            let files = self.collect_files(path, &canonical, &mut report);
            tracing::info!(
                "Starting {} of {} files under {} for {}",
                operation, files.len(), path.display(), key.identity()
            );

            for file in files {
                match self.transform_file(operation, &file, key) {
                    Ok(()) => report.succeeded.push(file),
                    Err(e) => report.record_failure(file, &e),
                }
            }

            tracing::info!(
                "{} finished: {} succeeded, {} failed",
                operation, report.success_count(), report.failure_count()
            );
        } else if meta.is_file() {
            self.transform_file(operation, path, key)?;
            tracing::info!("{} {} for {}", operation, path.display(), key.identity());
            report.succeeded.push(path.to_path_buf());
        } else {
            return Err(FaceLockError::Storage(format!(
                "not a regular file or directory: {}", path.display()
            )));
        }

        Ok(report)
    }

    /// Canonical form of `path`, or an error when it lies in an excluded
    /// directory.
    fn guard(&self, path: &Path) -> Result<PathBuf> {
        let canonical = fs::canonicalize(path)?;
        if self.is_excluded(&canonical) {
            return Err(FaceLockError::Storage(format!(
                "refusing to touch {}: it is inside the data directory", path.display()
            )));
        }
        Ok(canonical)
    }

    fn is_excluded(&self, canonical: &Path) -> bool {
        self.excluded.iter().any(|dir| canonical.starts_with(dir))
    }

    /// Every regular file under `root`, symlinks not followed. Entries that
    /// cannot be read are recorded as failures; excluded directories are
    /// recorded as skipped and not descended into.
    fn collect_files(&self, root: &Path, canonical_root: &Path, report: &mut Report) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut walk = WalkDir::new(root).follow_links(false).sort_by_file_name().into_iter();
        while let Some(entry) = walk.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    let err = match e.into_io_error() {
                        Some(io) => FaceLockError::Io(io),
                        None => FaceLockError::Storage("filesystem loop".into()),
                    };
                    report.record_failure(path, &err);
                    continue;
                }
            };

            // Nothing below the root is a followed symlink, so joining the
            // relative path onto the canonical root stays canonical.
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if self.is_excluded(&canonical_root.join(relative)) {
                tracing::info!("Skipping {}: inside the data directory", entry.path().display());
                if entry.file_type().is_dir() {
                    walk.skip_current_dir();
                }
                report.skipped.push(entry.into_path());
                continue;
            }

            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files
    }

    fn transform_file(&self, operation: Operation, path: &Path, key: &KeyHandle) -> Result<()> {
        let input = Zeroizing::new(fs::read(path)?);
        let output = Zeroizing::new(match operation {
            Operation::Protect => self.cipher.encrypt(key, &input)?,
            Operation::Unprotect => self.cipher.decrypt(key, &input)?,
        });

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(path)?.permissions();

        let mut temp = tempfile::Builder::new()
            .prefix(".facelock-")
            .tempfile_in(dir)?;
        temp.write_all(&output)?;
        temp.as_file().set_permissions(permissions)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        tracing::debug!("{} rewrote {} ({} bytes)", operation, path.display(), output.len());
        Ok(())
    }
}
