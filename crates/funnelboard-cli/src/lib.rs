//! Shared CLI definitions for funnelboard.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Compression format for data files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz)
    Gzip,
    /// Zstandard compression (.zst)
    Zstd,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// XZ compression (.xz)
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }
}

/// Region filter choice
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum RegionArg {
    /// Every row
    #[default]
    All,
    /// Only rows whose country normalizes to United States
    Us,
    /// Every row outside the United States, including unknown countries
    NonUs,
}

/// Email type filter choice
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum EmailTypeArg {
    /// Every row
    #[default]
    All,
    /// Only leads with a free/consumer email address
    Freemail,
    /// Only leads with a corporate email address
    Corporate,
}

/// Output format for exported charts
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ExportFormatArg {
    /// Raster image (plotters bitmap backend)
    Png,
    /// Vector image (plotters SVG backend)
    Svg,
    /// Encapsulated PostScript
    Eps,
}

/// Command-line arguments for funnelboard
#[derive(Clone, Parser, Debug)]
#[command(
    name = "funnelboard",
    version,
    about = "Marketing and sales conversion funnels in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// CSV path or http(s) URL of the lead export. Defaults to source.url from the config file
    #[arg(value_name = "SOURCE")]
    pub source: Option<String>,

    /// Path to a config file to use instead of ~/.config/funnelboard/config.toml
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Region filter
    #[arg(long = "region", value_enum, default_value_t = RegionArg::All)]
    pub region: RegionArg,

    /// Keep only rows with this company size. Use once per value; no value means every size
    #[arg(long = "company-size", value_name = "SIZE")]
    pub company_size: Vec<String>,

    /// Email type filter
    #[arg(long = "email-type", value_enum, default_value_t = EmailTypeArg::All)]
    pub email_type: EmailTypeArg,

    /// Print both funnels as a text table and exit
    #[arg(long = "print", action)]
    pub print: bool,

    /// Print both funnels as JSON and exit
    #[arg(long = "json", action, conflicts_with = "print")]
    pub json: bool,

    /// Write both funnels side by side to an image (png, svg or eps) and exit
    #[arg(long = "export", value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Force the export format instead of detecting it from the --export extension
    #[arg(long = "export-format", value_enum, requires = "export")]
    pub export_format: Option<ExportFormatArg>,

    /// Export width in pixels (overrides config chart.width)
    #[arg(long = "width", value_name = "PX")]
    pub width: Option<u32>,

    /// Export height in pixels (overrides config chart.height)
    #[arg(long = "height", value_name = "PX")]
    pub height: Option<u32>,

    /// Name of the column holding the freemail flag. Default: first column whose name contains "freemail"
    #[arg(long = "freemail-column", value_name = "NAME")]
    pub freemail_column: Option<String>,

    /// Specify the delimiter to use when reading the CSV
    #[arg(long = "delimiter")]
    pub delimiter: Option<u8>,

    /// Specify that the file has no header
    #[arg(long = "no-header")]
    pub no_header: Option<bool>,

    /// Skip this many rows when reading the CSV
    #[arg(long = "skip-rows")]
    pub skip_rows: Option<usize>,

    /// Number of rows to use when inferring CSV schema (default: 1000)
    #[arg(long = "infer-schema-length", value_name = "N")]
    pub infer_schema_length: Option<usize>,

    /// When reading CSV, ignore parse errors and continue with the next batch (default: false)
    #[arg(long = "ignore-errors", value_name = "BOOL", value_parser = clap::value_parser!(bool))]
    pub ignore_errors: Option<bool>,

    /// Treat these values as null when reading CSV. Use once per value; COL=VAL limits it to column COL
    #[arg(long = "null-value", value_name = "VAL")]
    pub null_value: Vec<String>,

    /// Specify the compression format explicitly (gzip, zstd, bzip2, xz).
    /// If not specified, compression is auto-detected from file extension.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Ignore any cached download and fetch the source again
    #[arg(long = "refresh", action)]
    pub refresh: bool,

    /// Seconds a cached download stays fresh (overrides config cache.ttl_secs). 0 disables caching
    #[arg(long = "cache-ttl", value_name = "SECS")]
    pub cache_ttl: Option<u64>,

    /// Clear all cache data and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/funnelboard/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,

    /// Enable debug logging (FUNNELBOARD_LOG overrides the level)
    #[arg(long = "debug", action)]
    pub debug: bool,
}

impl Args {
    /// True when the run produces output and exits instead of starting the dashboard.
    pub fn is_batch(&self) -> bool {
        self.print || self.json || self.export.is_some()
    }
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
