//! Extraction of a [`SelectionSet`] of entries into a destination directory.
//!
//! Entries are processed one at a time in ascending index order. Per-entry
//! problems (bad password, corrupt data, path traversal, existing files) are
//! collected in the [`ExtractionResult`]; only an I/O error on the
//! destination stops the run early.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::io::ReadAt;
use crate::selection::SelectionSet;
use crate::zip::{ArchiveError, ZipArchive, ZipFileEntry, write_output};

/// Why an entry was not extracted, without being an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The entry path would land outside the destination directory.
    PathTraversalRejected,
    /// The output file exists and overwriting is disabled.
    AlreadyExists,
    /// The selection names an index the archive does not have.
    MissingEntry,
}

#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
}

#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub index: usize,
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct FailedEntry {
    pub index: usize,
    pub name: String,
    pub error: ArchiveError,
}

/// I/O failure on the destination that aborted the run.
#[derive(Debug, thiserror::Error)]
#[error("cannot write to '{}': {source}", .path.display())]
pub struct DestinationError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Outcome of one extraction run.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub total_selected: usize,
    pub extracted: Vec<ExtractedEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<FailedEntry>,
    pub fatal: Option<DestinationError>,
    pub cancelled: bool,
}

impl ExtractionResult {
    /// Failed overall: the destination broke, or entries failed and no
    /// file was extracted. Created directories alone do not count.
    pub fn is_failed(&self) -> bool {
        let any_file = self.extracted.iter().any(|e| !e.is_directory);
        self.fatal.is_some() || (!any_file && !self.failed.is_empty())
    }

    pub fn password_failures(&self) -> usize {
        self.failed
            .iter()
            .filter(|f| f.error.is_password_error())
            .count()
    }

    pub fn traversal_rejections(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.reason == SkipReason::PathTraversalRejected)
            .count()
    }
}

/// Extracts a selection of entries from an open archive.
///
/// ```no_run
/// # async fn run(archive: zipman::ZipArchive<zipman::LocalFileReader>) {
/// use zipman::{SelectiveExtractor, selection::parse_selection};
///
/// let selection = parse_selection("0-3,7", archive.len()).unwrap();
/// let result = SelectiveExtractor::new(&archive, "out")
///     .password(Some("secret"))
///     .run(&selection, |done, total| println!("{done}/{total}"))
///     .await;
/// assert!(!result.is_failed());
/// # }
/// ```
pub struct SelectiveExtractor<'a, R: ReadAt> {
    archive: &'a ZipArchive<R>,
    destination: PathBuf,
    password: Option<Vec<u8>>,
    overwrite: bool,
    junk_paths: bool,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, R: ReadAt> SelectiveExtractor<'a, R> {
    pub fn new(archive: &'a ZipArchive<R>, destination: impl Into<PathBuf>) -> Self {
        Self {
            archive,
            destination: destination.into(),
            password: None,
            overwrite: false,
            junk_paths: false,
            cancel: None,
        }
    }

    pub fn password(mut self, password: Option<&str>) -> Self {
        self.password = password.map(|p| p.as_bytes().to_vec());
        self
    }

    /// Replace existing files instead of skipping them.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Drop directory components and extract every file flat.
    pub fn junk_paths(mut self, junk_paths: bool) -> Self {
        self.junk_paths = junk_paths;
        self
    }

    /// Flag checked before each entry; once set the run stops early.
    pub fn cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Extract every selected entry, calling `on_progress(done, total)`
    /// after each successful one.
    pub async fn run<F>(&self, selection: &SelectionSet, mut on_progress: F) -> ExtractionResult
    where
        F: FnMut(usize, usize),
    {
        let total = selection.len();
        let mut result = ExtractionResult {
            total_selected: total,
            ..Default::default()
        };

        if let Err(source) = tokio::fs::create_dir_all(&self.destination).await {
            result.fatal = Some(DestinationError {
                path: self.destination.clone(),
                source,
            });
            return result;
        }

        log::info!(
            "extracting {} entries to {}",
            total,
            self.destination.display()
        );

        for index in selection.iter() {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                log::warn!("extraction cancelled after {} entries", result.extracted.len());
                result.cancelled = true;
                break;
            }

            let Some(entry) = self.archive.entry(index) else {
                result.skipped.push(SkippedEntry {
                    index,
                    name: String::new(),
                    reason: SkipReason::MissingEntry,
                });
                continue;
            };

            match self.extract_one(entry).await {
                Ok(Some(path)) => {
                    result.extracted.push(ExtractedEntry {
                        index,
                        name: entry.file_name.clone(),
                        path,
                        is_directory: entry.is_directory,
                    });
                    on_progress(result.extracted.len(), total);
                }
                Ok(None) => {}
                Err(Step::Skip(reason)) => {
                    result.skipped.push(SkippedEntry {
                        index,
                        name: entry.file_name.clone(),
                        reason,
                    });
                }
                Err(Step::Fail(error)) => {
                    log::warn!("failed to extract '{}': {}", entry.file_name, error);
                    result.failed.push(FailedEntry {
                        index,
                        name: entry.file_name.clone(),
                        error,
                    });
                }
                Err(Step::Fatal(error)) => {
                    log::error!("{error}");
                    result.fatal = Some(error);
                    break;
                }
            }
        }

        result
    }

    async fn extract_one(&self, entry: &ZipFileEntry) -> Result<Option<PathBuf>, Step> {
        let output_path = if self.junk_paths {
            if entry.is_directory {
                // Nothing to create when paths are flattened.
                return Ok(None);
            }
            junked_path(&self.destination, &entry.file_name)
        } else {
            resolve_entry_path(&self.destination, &entry.file_name)
        };

        let Some(output_path) = output_path else {
            log::warn!(
                "rejected '{}': path escapes {}",
                entry.file_name,
                self.destination.display()
            );
            return Err(Step::Skip(SkipReason::PathTraversalRejected));
        };

        if !entry.is_directory && !self.overwrite && output_path.exists() {
            log::warn!("skipping '{}': file exists", entry.file_name);
            return Err(Step::Skip(SkipReason::AlreadyExists));
        }

        let data = self
            .archive
            .read_entry(entry, self.password.as_deref())
            .await
            .map_err(Step::Fail)?;

        write_output(entry, &output_path, &data)
            .await
            .map_err(|source| {
                Step::Fatal(DestinationError {
                    path: output_path.clone(),
                    source,
                })
            })?;

        log::debug!("extracted '{}' to {}", entry.file_name, output_path.display());
        Ok(Some(output_path))
    }
}

enum Step {
    Skip(SkipReason),
    Fail(ArchiveError),
    Fatal(DestinationError),
}

/// Resolve an archive path below `base`, or `None` if it would escape.
///
/// Both `/` and `\` separate components. Absolute paths, drive prefixes
/// and `..` climbing above the root are rejected; `.` and empty
/// components are ignored.
pub fn resolve_entry_path(base: &Path, entry_name: &str) -> Option<PathBuf> {
    if entry_name.starts_with('/') || entry_name.starts_with('\\') {
        return None;
    }

    let mut relative = PathBuf::new();
    let mut depth = 0usize;

    for part in entry_name.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if depth == 0 {
                    return None;
                }
                relative.pop();
                depth -= 1;
            }
            _ => {
                // A component must stay a single normal path segment.
                let mut components = Path::new(part).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => {}
                    _ => return None,
                }
                if part.contains(':') || part.contains('\0') {
                    return None;
                }
                relative.push(part);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return None;
    }
    Some(base.join(relative))
}

fn junked_path(base: &Path, entry_name: &str) -> Option<PathBuf> {
    let last = entry_name.rsplit(['/', '\\']).next()?;
    resolve_entry_path(base, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> &'static Path {
        Path::new("/srv/out")
    }

    #[test]
    fn plain_paths_resolve_below_base() {
        assert_eq!(
            resolve_entry_path(base(), "docs/readme.txt"),
            Some(PathBuf::from("/srv/out/docs/readme.txt"))
        );
        assert_eq!(
            resolve_entry_path(base(), "dir/"),
            Some(PathBuf::from("/srv/out/dir"))
        );
    }

    #[test]
    fn inner_parent_components_are_allowed() {
        assert_eq!(
            resolve_entry_path(base(), "a/./b/../c.txt"),
            Some(PathBuf::from("/srv/out/a/c.txt"))
        );
        assert_eq!(
            resolve_entry_path(base(), "a\\b.txt"),
            Some(PathBuf::from("/srv/out/a/b.txt"))
        );
    }

    #[test]
    fn escaping_paths_are_rejected() {
        for name in [
            "../evil.txt",
            "a/../../evil.txt",
            "/etc/passwd",
            "\\windows\\system.ini",
            "C:\\evil.txt",
            "c:/evil.txt",
            "..",
            "./",
            "",
        ] {
            assert_eq!(resolve_entry_path(base(), name), None, "{name:?}");
        }
    }

    #[test]
    fn junked_paths_keep_only_the_file_name() {
        assert_eq!(
            junked_path(base(), "deep/nested/file.bin"),
            Some(PathBuf::from("/srv/out/file.bin"))
        );
        assert_eq!(junked_path(base(), "deep/.."), None);
    }

    #[test]
    fn failure_requires_no_extracted_files() {
        let mut result = ExtractionResult::default();
        assert!(!result.is_failed());

        result.failed.push(FailedEntry {
            index: 0,
            name: "a".into(),
            error: ArchiveError::WrongPassword { name: "a".into() },
        });
        assert!(result.is_failed());
        assert_eq!(result.password_failures(), 1);

        result.extracted.push(ExtractedEntry {
            index: 1,
            name: "d/".into(),
            path: PathBuf::from("d"),
            is_directory: true,
        });
        assert!(result.is_failed());

        result.extracted.push(ExtractedEntry {
            index: 2,
            name: "b".into(),
            path: PathBuf::from("b"),
            is_directory: false,
        });
        assert!(!result.is_failed());
    }
}
