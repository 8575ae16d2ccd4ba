//! Building a new archive from a file or directory tree.

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::zip::{ArchiveError, DosDateTime, WriteOptions, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("source path does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("no files found to compress in {}", .0.display())]
    NoFiles(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A file on disk and the name it gets inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateSummary {
    pub files: usize,
    pub total_size: u64,
    pub archive_size: u64,
}

/// Append `.zip` unless the path already ends with it (any case).
pub fn zip_output_path(path: &Path) -> PathBuf {
    let has_ext = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if has_ext {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".zip");
        PathBuf::from(name)
    }
}

/// Collect the files below `source`.
///
/// A single file is stored under its own name; a directory's files are
/// stored relative to it, in sorted order. Empty directories are not
/// recorded.
pub fn collect_sources(source: &Path) -> Result<Vec<SourceFile>, CreateError> {
    if !source.exists() {
        return Err(CreateError::SourceMissing(source.to_path_buf()));
    }

    if source.is_file() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| CreateError::NoFiles(source.to_path_buf()))?;
        return Ok(vec![SourceFile {
            path: source.to_path_buf(),
            name,
        }]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            name,
        });
    }

    if files.is_empty() {
        return Err(CreateError::NoFiles(source.to_path_buf()));
    }
    Ok(files)
}

/// Write `sources` into a new archive at `output`.
///
/// `on_progress(done, total)` runs after each file is added.
pub fn create_archive<F>(
    sources: &[SourceFile],
    output: &Path,
    options: WriteOptions,
    mut on_progress: F,
) -> Result<CreateSummary, CreateError>
where
    F: FnMut(usize, usize),
{
    // Never pack a previous version of the output into itself.
    let output_canonical = output.canonicalize().ok();
    let sources: Vec<&SourceFile> = sources
        .iter()
        .filter(|s| output_canonical.is_none() || s.path.canonicalize().ok() != output_canonical)
        .collect();

    log::info!(
        "creating {} with {} files (level {}, encrypted: {})",
        output.display(),
        sources.len(),
        options.level,
        options.password.is_some()
    );

    // An existing output stays intact until the new archive is complete.
    let partial = partial_path(output);
    let summary = write_sources(&sources, &partial, options, &mut on_progress)
        .and_then(|summary| fs::rename(&partial, output).map(|_| summary).map_err(Into::into));
    if summary.is_err() {
        let _ = fs::remove_file(&partial);
    }
    summary
}

fn write_sources<F>(
    sources: &[&SourceFile],
    path: &Path,
    options: WriteOptions,
    on_progress: &mut F,
) -> Result<CreateSummary, CreateError>
where
    F: FnMut(usize, usize),
{
    let file = File::create(path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file), options);
    let mut summary = CreateSummary::default();

    for (i, source) in sources.iter().enumerate() {
        let read_err = |source_err: io::Error| CreateError::Read {
            path: source.path.clone(),
            source: source_err,
        };
        let data = fs::read(&source.path).map_err(read_err)?;
        let modified = fs::metadata(&source.path)
            .and_then(|m| m.modified())
            .map(|t| DosDateTime::from_datetime(&DateTime::<Local>::from(t).naive_local()))
            .map_err(read_err)?;

        writer.add_file(&source.name, &data, modified)?;
        summary.files += 1;
        summary.total_size += data.len() as u64;
        on_progress(i + 1, sources.len());
    }

    let file = writer.finish()?.into_inner().map_err(|e| e.into_error())?;
    summary.archive_size = file.metadata()?.len();
    Ok(summary)
}

/// Hidden sibling of `output` used while the archive is written.
fn partial_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{name}.partial"))
}
