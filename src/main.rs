//! `streamzip` command-line tool: list or extract entries of a local or
//! remote ZIP archive, fetching only what the selected entries need.

use anyhow::{Result, bail};
use clap::Parser;
use futures::TryStreamExt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use streamzip::zip::{extract_to_file, extract_to_stdout};
use streamzip::{ByteSource, Cli, EntryMetadata, FileEntry, HttpSource, LocalFileSource, ZipExtractor};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.is_http_url() {
        let source = Arc::new(HttpSource::new(cli.file.clone()).await?);

        process_zip(source.clone(), &cli).await?;

        // How much of the archive actually crossed the network
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {} of {}",
                format_size(source.transferred_bytes()),
                format_size(source.length())
            );
        }
    } else {
        let source = Arc::new(LocalFileSource::new(Path::new(&cli.file))?);
        process_zip(source, &cli).await?;
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the level picked from `-q`.
fn init_tracing(cli: &Cli) {
    let default_level = if cli.is_very_quiet() { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Stream the selected entries and list or extract each one as it arrives.
async fn process_zip<S: ByteSource + 'static>(source: Arc<S>, cli: &Cli) -> Result<()> {
    let extractor = ZipExtractor::with_config(source, cli.reader_config());
    let filter = cli.selector().into_filter();

    let mut entries = extractor.entries(filter).await?;

    if cli.list || cli.verbose {
        return list_entries(&mut entries, cli.verbose).await;
    }

    while let Some(entry) = entries.try_next().await? {
        extract_entry(&entry, cli).await?;
    }

    Ok(())
}

const RULE: &str = "----------------------------------------------------------------------";

/// Print one path per entry (`-l`), or a table with sizes, ratio and DOS
/// timestamps plus a totals row (`-v`).
async fn list_entries(entries: &mut streamzip::FileEntryStream, verbose: bool) -> Result<()> {
    if verbose {
        println!("{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name", "Length", "Packed", "Ratio", "Date", "Time");
        println!("{RULE}");
    }

    let (mut files, mut packed, mut unpacked) = (0usize, 0u64, 0u64);

    while let Some(entry) = entries.try_next().await? {
        if !verbose {
            println!("{}", entry.path());
            continue;
        }

        let (y, mo, d) = entry.mod_date();
        let (h, mi, _) = entry.mod_time();
        let uncompressed = entry.bytes().len() as u64;

        println!(
            "{uncompressed:>10}  {:>10}  {}  {y:04}-{mo:02}-{d:02}  {h:02}:{mi:02}  {}",
            entry.compressed_size(),
            ratio(entry.compressed_size(), uncompressed),
            entry.path()
        );

        if !entry.is_directory() {
            unpacked += uncompressed;
            packed += entry.compressed_size();
            files += 1;
        }
    }

    if verbose {
        println!("{RULE}");
        println!(
            "{unpacked:>10}  {packed:>10}  {}  {:>21}  {files} files",
            ratio(packed, unpacked),
            ""
        );
    }

    Ok(())
}

/// Percentage saved by compression, right-aligned to five columns.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "   0%".to_string()
    }
}

/// Write one decoded entry to stdout (`-p`) or below the output directory,
/// honoring `-d`, `-j` and the `-n`/`-o` overwrite policy.
async fn extract_entry(entry: &FileEntry, cli: &Cli) -> Result<()> {
    if cli.pipe {
        if entry.is_directory() {
            return Ok(());
        }
        if cli.patterns.len() != 1 || has_wildcards(&cli.patterns) {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("--- {} ---\n", entry.path()).as_bytes())
                .await?;
        }
        extract_to_stdout(entry).await?;
        return Ok(());
    }

    if cli.junk_paths && entry.is_directory() {
        return Ok(());
    }

    let Some(relative) = safe_relative_path(entry.path(), cli.junk_paths) else {
        bail!("refusing to extract '{}': path escapes the output directory", entry.path());
    };
    let output_path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(&relative),
        None => relative,
    };

    if !entry.is_directory() && output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.path());
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.path());
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        let action = if entry.is_directory() { "creating" } else { "extracting" };
        println!("  {:>10}: {}", action, entry.path());
    }

    extract_to_file(entry, &output_path).await?;

    Ok(())
}

fn has_wildcards(patterns: &[String]) -> bool {
    patterns.iter().any(|p| streamzip::pattern::has_glob_chars(p) || p.ends_with('/'))
}

/// Map an archive path to a relative output path, rejecting absolute paths
/// and `..` components.
fn safe_relative_path(path: &str, junk_paths: bool) -> Option<PathBuf> {
    let path = Path::new(path);
    if junk_paths {
        return path.file_name().map(PathBuf::from);
    }

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() { None } else { Some(out) }
}

fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if size < 1024 {
        return format!("{size} bytes");
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
