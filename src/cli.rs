use clap::Parser;

use crate::config::{
    DEFAULT_BATCH_GAP, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_PREFER_RANGES_ABOVE,
    DEFAULT_SCAN_WINDOW, ReaderConfig,
};
use crate::pattern::PathSelector;

#[derive(Parser, Debug)]
#[command(name = "streamzip")]
#[command(version)]
#[command(about = "Stream selected entries out of local or remote ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  streamzip -l https://example.com/big.zip 'docs/*'   list matching entries of a remote ZIP\n  \
  streamzip -p site.zip index.html | less            send one entry to a pager\n  \
  streamzip data.zip -d out -x tests/                extract everything except tests/")]
pub struct Cli {
    /// Local ZIP path or http(s) URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entries to extract: paths, basenames, directory prefixes or globs (default: all)
    #[arg(value_name = "PATTERNS")]
    pub patterns: Vec<String>,

    /// List matching entries
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely (sizes, ratio, timestamps)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write entry contents to stdout instead of files
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Output directory for extracted entries
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Skip entries matching these patterns
    #[arg(short = 'x', value_name = "PATTERN", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite existing files
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Flatten paths: extract every file into one directory
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Less output; repeat to silence warnings too
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Maximum concurrent range requests
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES)]
    pub concurrency: usize,

    /// Entries closer than this many bytes share one range request
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BATCH_GAP)]
    pub batch_gap: u64,

    /// Window size for the backward central directory scan
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_SCAN_WINDOW)]
    pub scan_window: u64,

    /// Archives below this size are always streamed linearly
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_PREFER_RANGES_ABOVE)]
    pub range_threshold: u64,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::default()
            .with_max_concurrent_fetches(self.concurrency.max(1))
            .with_batch_gap(self.batch_gap)
            .with_scan_window(self.scan_window.max(1))
            .with_prefer_ranges_above(self.range_threshold)
    }

    pub fn selector(&self) -> PathSelector {
        PathSelector::new(self.patterns.clone(), self.exclude.clone())
    }
}
