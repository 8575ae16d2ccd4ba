//! Main entry point for the zipman CLI application.
//!
//! Dispatches the `list`, `extract`, `create`, `info` and `test`
//! subcommands against local ZIP archives.

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use zipman::cli::Command;
use zipman::create::{collect_sources, create_archive, zip_output_path};
use zipman::password::{NoPrompt, TerminalPrompt, resolve_password};
use zipman::selection::parse_selection;
use zipman::zip::WriteOptions;
use zipman::{
    Cli, Config, ExtractionResult, LocalFileReader, SelectionSet, SelectiveExtractor, SkipReason,
    ZipArchive,
};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging and configuration,
/// and dispatches to the handler for the chosen subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::List {
            file,
            long,
            password,
        } => list_files(&file, long, password.as_deref(), &config).await,
        Command::Extract {
            file,
            selection,
            extract_dir,
            password,
            overwrite,
            never_overwrite,
            junk_paths,
            quiet,
        } => {
            let options = ExtractArgs {
                selection,
                extract_dir: extract_dir.unwrap_or_else(|| config.default_extract_dir.clone()),
                password,
                // -n wins over a config-level overwrite default
                overwrite: !never_overwrite && (overwrite || config.overwrite),
                junk_paths,
                quiet,
            };
            extract_files(&file, options, &config).await
        }
        Command::Create {
            source,
            output,
            level,
            encrypt,
            password,
            force,
        } => {
            let level = level.unwrap_or(config.compression_level);
            create_zip(&source, &output, level, encrypt, password, force)
        }
        Command::Info { file } => show_info(&file).await,
        Command::Test { file, password } => test_archive(&file, password.as_deref(), &config).await,
    }
}

struct ExtractArgs {
    selection: Option<String>,
    extract_dir: PathBuf,
    password: Option<String>,
    overwrite: bool,
    junk_paths: bool,
    quiet: bool,
}

/// Open a local archive and read its central directory.
async fn open_archive(path: &Path) -> Result<ZipArchive<LocalFileReader>> {
    let reader = LocalFileReader::new(path)
        .with_context(|| format!("Zip file not found: {}", path.display()))?;
    ZipArchive::open(Arc::new(reader))
        .await
        .with_context(|| format!("Invalid zip file: {}", path.display()))
}

/// True when prompts can be shown.
fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Pick the password for an archive, prompting on a terminal.
async fn archive_password(
    archive: &ZipArchive<LocalFileReader>,
    supplied: Option<&str>,
    config: &Config,
) -> Result<Option<String>> {
    let attempts = config.password_attempts;
    let password = if is_interactive() {
        resolve_password(archive, supplied, &mut TerminalPrompt, attempts).await?
    } else {
        resolve_password(archive, supplied, &mut NoPrompt, attempts).await?
    };
    Ok(password)
}

/// List entries of the archive.
///
/// Supports two output formats:
/// - Simple format: index and name
/// - Long format (`-l`): size, compressed size, ratio and date, plus totals
///
/// Encrypted entries are marked with `*`.
async fn list_files(file: &Path, long: bool, password: Option<&str>, config: &Config) -> Result<()> {
    let archive = open_archive(file).await?;

    if let Some(password) = password {
        if !archive.check_password(password.as_bytes()).await {
            eprintln!("Warning: incorrect password for zip file");
        }
    }

    if archive.is_empty() {
        println!("No files found in the archive");
        return Ok(());
    }

    let width = config.max_filename_display;
    if long {
        println!(
            "{:<6} {:<width$} {:>10} {:>10} {:>6}  {:<19}",
            "Index", "Name", "Size", "Compressed", "Ratio", "Date"
        );
        println!("{}", "-".repeat(width + 58));
    }

    for entry in archive.entries() {
        let marker = if entry.is_encrypted() { "*" } else { "" };
        let name = format!("{}{}", truncate_filename(&entry.file_name, width), marker);

        if long {
            println!(
                "{:<6} {:<width$} {:>10} {:>10} {:>5.1}%  {:<19}",
                entry.index,
                name,
                format_size(entry.uncompressed_size),
                format_size(entry.compressed_size),
                entry.compression_ratio(),
                entry.formatted_date()
            );
        } else {
            println!("{:<6} {}", entry.index, name);
        }
    }

    if long {
        let stats = archive.stats();
        println!("{}", "-".repeat(width + 58));
        println!(
            "Total files: {}, directories: {}",
            stats.files, stats.directories
        );
        println!(
            "Total size: {}, compressed: {} ({:.1}% saved)",
            format_size(stats.total_size),
            format_size(stats.compressed_size),
            stats.compression_ratio()
        );
    }

    Ok(())
}

/// Extract all entries or a selection into a directory.
///
/// The selection string is validated before anything is written. A
/// Ctrl-C stops the run after the current entry.
async fn extract_files(file: &Path, args: ExtractArgs, config: &Config) -> Result<()> {
    let archive = open_archive(file).await?;

    let selection = match &args.selection {
        Some(text) => parse_selection(text, archive.len())
            .with_context(|| format!("Invalid selection '{text}' (examples: '0,2,5' or '1-3,7,9-11')"))?,
        None => SelectionSet::all(archive.len()),
    };

    if selection.is_empty() {
        if !args.quiet {
            eprintln!("No entries selected");
        }
        return Ok(());
    }

    let password = archive_password(&archive, args.password.as_deref(), config).await?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    if !args.quiet {
        println!(
            "Extracting {} entries to: {}",
            selection.len(),
            args.extract_dir.display()
        );
    }

    let progress = create_progress_bar(selection.len() as u64, !args.quiet);
    let result = SelectiveExtractor::new(&archive, args.extract_dir.clone())
        .password(password.as_deref())
        .overwrite(args.overwrite)
        .junk_paths(args.junk_paths)
        .cancel_flag(&cancel)
        .run(&selection, |done, _total| progress.set_position(done as u64))
        .await;
    progress.finish_and_clear();

    if !args.quiet {
        print_extraction_report(&result);
    }

    if let Some(fatal) = &result.fatal {
        bail!("Extraction aborted: {fatal}");
    }
    if result.cancelled {
        bail!("Extraction cancelled by user");
    }
    if result.is_failed() {
        if result.password_failures() == result.failed.len() {
            bail!("Extraction failed: incorrect or missing password");
        }
        bail!("Extraction failed: no entries could be extracted");
    }

    Ok(())
}

/// Print per-entry outcomes and the closing summary line.
fn print_extraction_report(result: &ExtractionResult) {
    for entry in &result.extracted {
        println!("  extracting: {}", entry.name);
    }
    for skipped in &result.skipped {
        let reason = match skipped.reason {
            SkipReason::PathTraversalRejected => "path escapes destination",
            SkipReason::AlreadyExists => "file exists, use -o to overwrite",
            SkipReason::MissingEntry => "no such entry",
        };
        eprintln!("Skipping: #{} {} ({})", skipped.index, skipped.name, reason);
    }
    for failed in &result.failed {
        eprintln!("Failed: #{} {}", failed.index, failed.error);
    }

    println!(
        "Extracted {}/{} entries ({} skipped, {} failed)",
        result.extracted.len(),
        result.total_selected,
        result.skipped.len(),
        result.failed.len()
    );
}

/// Create an archive from a file or directory.
///
/// An existing output is replaced only with `-f` or after confirmation.
fn create_zip(
    source: &Path,
    output: &Path,
    level: u32,
    encrypt: bool,
    password: Option<String>,
    force: bool,
) -> Result<()> {
    let output = zip_output_path(output);

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            bail!("Parent directory does not exist: {}", parent.display());
        }
    }

    if output.exists() && !force {
        if !is_interactive() {
            bail!("{} already exists (use -f to overwrite)", output.display());
        }
        let overwrite = dialoguer::Confirm::new()
            .with_prompt(format!("File '{}' already exists. Overwrite?", output.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Archive creation cancelled.");
            return Ok(());
        }
    }

    let password = if encrypt {
        Some(
            dialoguer::Password::new()
                .with_prompt("Password for archive")
                .with_confirmation("Repeat password", "Passwords do not match")
                .interact()?,
        )
    } else {
        password
    };
    let password = password.filter(|p| {
        if p.is_empty() {
            eprintln!("Warning: empty password, creating a standard archive");
        }
        !p.is_empty()
    });

    let sources = collect_sources(source)?;

    println!("Creating zip archive: {}", output.display());
    println!("Files to compress: {}", sources.len());

    let progress = create_progress_bar(sources.len() as u64, true);
    let options = WriteOptions {
        level,
        password: password.map(String::into_bytes),
    };
    let summary = create_archive(&sources, &output, options, |done, _total| {
        progress.set_position(done as u64)
    })
    .with_context(|| format!("Error creating zip archive {}", output.display()))?;
    progress.finish_and_clear();

    println!(
        "Created {} ({} files, {} -> {})",
        output.display(),
        summary.files,
        format_size(summary.total_size),
        format_size(summary.archive_size)
    );

    Ok(())
}

/// Print a summary of the archive contents.
async fn show_info(file: &Path) -> Result<()> {
    let archive = open_archive(file).await?;

    let stats = archive.stats();

    println!("File: {}", file.display());
    println!("Archive size: {}", format_size(archive.archive_size()));
    println!("Total files: {}", stats.files);
    println!("Total directories: {}", stats.directories);
    println!("Total size: {}", format_size(stats.total_size));
    println!("Compressed size: {}", format_size(stats.compressed_size));
    println!("Overall compression: {:.1}%", stats.compression_ratio());
    println!(
        "Password protected: {}",
        match stats.encrypted_files {
            0 => "No".to_string(),
            n if n == stats.files => "Yes".to_string(),
            n => format!("Partially ({n} of {} files)", stats.files),
        }
    );

    Ok(())
}

/// Decode every file entry and verify its CRC.
async fn test_archive(file: &Path, password: Option<&str>, config: &Config) -> Result<()> {
    let archive = open_archive(file).await?;
    let password = archive_password(&archive, password, config).await?;

    println!("Testing {}", file.display());

    let mut ok_count = 0usize;
    let mut failures = Vec::new();

    for entry in archive.entries().iter().filter(|e| !e.is_directory) {
        match archive
            .read_entry(entry, password.as_deref().map(str::as_bytes))
            .await
        {
            Ok(_) => {
                ok_count += 1;
                log::info!("OK: {}", entry.file_name);
            }
            Err(e) => {
                println!("  FAILED: {} - {}", entry.file_name, e);
                failures.push(entry.file_name.clone());
            }
        }
    }

    println!("{} OK, {} failed", ok_count, failures.len());
    if !failures.is_empty() {
        bail!("{} entries failed the integrity test", failures.len());
    }
    println!("No errors detected in {}", file.display());

    Ok(())
}

/// Create a progress bar, hidden when `enable` is false.
fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

/// Shorten long names to `max_length` characters with a trailing "...".
fn truncate_filename(name: &str, max_length: usize) -> String {
    if name.chars().count() <= max_length {
        return name.to_string();
    }
    let kept: String = name.chars().take(max_length.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
