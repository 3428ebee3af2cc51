//! Reading a lead export into a polars `DataFrame`: fetch bytes, decompress, parse CSV.

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use polars::prelude::*;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::source::{url_path_extension, InputSource};
use funnelboard_cli::{Args, CompressionFormat};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub skip_rows: Option<usize>,
    pub infer_schema_length: Option<usize>,
    pub ignore_errors: bool,
    /// `VAL` applies to every column, `COL=VAL` to one column.
    pub null_values: Vec<String>,
    pub compression: Option<CompressionFormat>,
    pub timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self {
            delimiter: None,
            has_header: None,
            skip_rows: None,
            infer_schema_length: None,
            ignore_errors: false,
            null_values: Vec::new(),
            compression: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = Some(skip_rows);
        self
    }

    pub fn with_null_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.null_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compression(mut self, compression: CompressionFormat) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Create LoadOptions from CLI args and config, with CLI args taking precedence
    pub fn from_args_and_config(args: &Args, config: &SourceConfig) -> Self {
        let mut opts = LoadOptions::new();

        opts.delimiter = args.delimiter.or(config.delimiter);
        opts.skip_rows = args.skip_rows.or(config.skip_rows);
        opts.infer_schema_length = args.infer_schema_length.or(config.infer_schema_length);
        opts.ignore_errors = args.ignore_errors.unwrap_or(config.ignore_errors);

        // --no-header overrides config
        opts.has_header = if let Some(no_header) = args.no_header {
            Some(!no_header)
        } else {
            config.has_header
        };

        opts.null_values = if args.null_value.is_empty() {
            config.null_values.clone()
        } else {
            args.null_value.clone()
        };
        opts.compression = args.compression;
        opts.timeout = Duration::from_secs(config.timeout_secs);
        opts
    }

    /// Explicit compression, else the one implied by the source's extension.
    pub fn compression_for(&self, source: &InputSource) -> Option<CompressionFormat> {
        self.compression.or_else(|| match source {
            InputSource::Local(p) => CompressionFormat::from_extension(p),
            InputSource::Http(url) => {
                CompressionFormat::from_extension(Path::new(&url_path_extension(url).0))
            }
        })
    }
}

impl From<&Args> for LoadOptions {
    fn from(args: &Args) -> Self {
        Self::from_args_and_config(args, &SourceConfig::default())
    }
}

/// Read, decompress and parse `source`.
pub fn load(source: &InputSource, options: &LoadOptions) -> Result<DataFrame> {
    let bytes = read_bytes(source, options)?;
    parse_source_bytes(source, bytes, options)
}

/// Decompress and parse bytes that were read from `source`.
pub fn parse_source_bytes(
    source: &InputSource,
    bytes: Vec<u8>,
    options: &LoadOptions,
) -> Result<DataFrame> {
    let bytes = decompress(bytes, options.compression_for(source))?;
    let df = parse_csv(bytes, options)?;
    info!(source = %source, rows = df.height(), columns = df.width(), "loaded leads");
    Ok(df)
}

/// Raw (possibly compressed) contents of `source`.
pub fn read_bytes(source: &InputSource, options: &LoadOptions) -> Result<Vec<u8>> {
    match source {
        InputSource::Local(path) => {
            std::fs::read(path).wrap_err_with(|| format!("Could not read {}", path.display()))
        }
        InputSource::Http(url) => fetch_http(url, options.timeout),
    }
}

#[cfg(feature = "http")]
fn fetch_http(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    debug!(url, timeout_secs = timeout.as_secs(), "downloading source");
    let response = match ureq::get(url).timeout(timeout).call() {
        Ok(r) => r,
        Err(ureq::Error::Status(status, r)) => {
            return Err(eyre!(
                "Server returned {} {}. Check the URL.",
                status,
                r.status_text()
            ));
        }
        Err(e) => {
            return Err(eyre!(
                "Download failed. Check the URL and your connection: {}",
                e
            ));
        }
    };
    let status = response.status();
    if status >= 400 {
        return Err(eyre!(
            "Server returned {} {}. Check the URL.",
            status,
            response.status_text()
        ));
    }
    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|_| eyre!("Download failed while reading the response."))?;
    info!(url, bytes = body.len(), "downloaded source");
    Ok(body)
}

#[cfg(not(feature = "http"))]
fn fetch_http(url: &str, _timeout: Duration) -> Result<Vec<u8>> {
    Err(eyre!(
        "Cannot download {}: funnelboard was built without the http feature.",
        url
    ))
}

/// Bzip2 and xz are decoded here. Gzip and zstd are left to polars, which detects them
/// from their magic bytes.
pub fn decompress(bytes: Vec<u8>, compression: Option<CompressionFormat>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match compression {
        None | Some(CompressionFormat::Gzip) | Some(CompressionFormat::Zstd) => return Ok(bytes),
        Some(CompressionFormat::Bzip2) => {
            bzip2::read::BzDecoder::new(BufReader::new(Cursor::new(bytes)))
                .read_to_end(&mut out)?;
        }
        Some(CompressionFormat::Xz) => {
            xz2::read::XzDecoder::new(BufReader::new(Cursor::new(bytes)))
                .read_to_end(&mut out)?;
        }
    }
    debug!(bytes = out.len(), "decompressed source");
    Ok(out)
}

fn read_options(options: &LoadOptions, null_values: Option<NullValues>) -> CsvReadOptions {
    let mut read_options = CsvReadOptions::default();
    if let Some(skip_rows) = options.skip_rows {
        read_options.skip_rows = skip_rows;
    }
    if let Some(has_header) = options.has_header {
        read_options.has_header = has_header;
    }
    if let Some(n) = options.infer_schema_length {
        read_options.infer_schema_length = Some(n);
    }
    read_options.ignore_errors = options.ignore_errors;
    let delimiter = options.delimiter;
    read_options.map_parse_options(|opts| {
        let o = match delimiter {
            Some(d) => opts.with_separator(d),
            None => opts,
        };
        match &null_values {
            Some(n) => o.with_null_values(Some(n.clone())),
            None => o,
        }
    })
}

/// Parse CSV bytes with `options` and trim surrounding whitespace from column names.
pub fn parse_csv(bytes: Vec<u8>, options: &LoadOptions) -> Result<DataFrame> {
    let null_values = build_null_values(&bytes, options)?;
    let df = CsvReader::new(Cursor::new(bytes))
        .with_options(read_options(options, null_values))
        .finish()?;
    Ok(trim_column_names(df.lazy())?.collect()?)
}

fn parse_null_value_specs(specs: &[String]) -> (Vec<String>, Vec<(String, String)>) {
    let mut global = Vec::new();
    let mut per_column = Vec::new();
    for s in specs {
        match s.split_once('=') {
            Some((col, val)) => per_column.push((col.trim().to_string(), val.to_string())),
            None => global.push(s.clone()),
        }
    }
    (global, per_column)
}

/// Polars null values for the configured specs. Mixing global and per-column values needs the
/// header, so the first row is parsed to learn the column names.
fn build_null_values(bytes: &[u8], options: &LoadOptions) -> Result<Option<NullValues>> {
    let (global, per_column) = parse_null_value_specs(&options.null_values);
    if global.is_empty() && per_column.is_empty() {
        return Ok(None);
    }
    if per_column.is_empty() {
        let vals: Vec<PlSmallStr> = global.iter().map(|s| PlSmallStr::from(s.as_str())).collect();
        return Ok(Some(if vals.len() == 1 {
            NullValues::AllColumnsSingle(vals[0].clone())
        } else {
            NullValues::AllColumns(vals)
        }));
    }
    if global.is_empty() {
        let pairs = per_column
            .iter()
            .map(|(c, v)| (PlSmallStr::from(c.as_str()), PlSmallStr::from(v.as_str())))
            .collect();
        return Ok(Some(NullValues::Named(pairs)));
    }

    let mut header_options = read_options(options, None);
    header_options.n_rows = Some(1);
    let header = CsvReader::new(Cursor::new(bytes.to_vec()))
        .with_options(header_options)
        .finish()?;
    let first_global = PlSmallStr::from(global[0].as_str());
    let pairs = header
        .get_column_names()
        .iter()
        .map(|name| {
            let val = per_column
                .iter()
                .rev()
                .find(|(c, _)| c == name.trim())
                .map(|(_, v)| PlSmallStr::from(v.as_str()))
                .unwrap_or_else(|| first_global.clone());
            (PlSmallStr::from(name.as_str()), val)
        })
        .collect();
    Ok(Some(NullValues::Named(pairs)))
}

fn trim_column_names(mut lf: LazyFrame) -> Result<LazyFrame> {
    let schema = lf.collect_schema()?;
    let names: Vec<String> = schema.iter_names().map(|s| s.to_string()).collect();
    let trimmed: Vec<String> = names.iter().map(|s| s.trim().to_string()).collect();
    if names == trimmed {
        return Ok(lf);
    }
    Ok(lf.rename(
        names.iter().map(|s| s.as_str()),
        trimmed.iter().map(|s| s.as_str()),
        false,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_value_specs_split_on_equals() {
        let (global, per_column) =
            parse_null_value_specs(&["NA".to_string(), "Country=--".to_string()]);
        assert_eq!(global, vec!["NA"]);
        assert_eq!(per_column, vec![("Country".to_string(), "--".to_string())]);
    }

    #[test]
    fn compression_from_url_ignores_query() {
        let opts = LoadOptions::new();
        let source = InputSource::parse("https://example.com/leads.csv.xz?token=abc");
        assert_eq!(opts.compression_for(&source), Some(CompressionFormat::Xz));
        let forced = LoadOptions::new().with_compression(CompressionFormat::Bzip2);
        assert_eq!(
            forced.compression_for(&source),
            Some(CompressionFormat::Bzip2)
        );
    }

    #[test]
    fn parses_and_trims_headers() {
        let csv = b" Country ,Company Size\nUS,1-10\nGermany,11-50\n".to_vec();
        let df = parse_csv(csv, &LoadOptions::new()).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["Country", "Company Size"]);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn custom_delimiter_and_nulls() {
        let csv = b"Country;Company Size\nNA;1-10\nUS;--\n".to_vec();
        let opts = LoadOptions::new()
            .with_delimiter(b';')
            .with_null_values(["NA", "Company Size=--"]);
        let df = parse_csv(csv, &opts).unwrap();
        assert_eq!(df.column("Country").unwrap().null_count(), 1);
        assert_eq!(df.column("Company Size").unwrap().null_count(), 1);
    }

    #[test]
    fn args_override_config() {
        use clap::Parser;
        let args = Args::parse_from(["funnelboard", "--delimiter", "9", "--null-value", "N/A"]);
        let config = SourceConfig {
            delimiter: Some(b';'),
            skip_rows: Some(2),
            null_values: vec!["NA".to_string()],
            ..SourceConfig::default()
        };
        let opts = LoadOptions::from_args_and_config(&args, &config);
        assert_eq!(opts.delimiter, Some(b'\t'));
        assert_eq!(opts.skip_rows, Some(2));
        assert_eq!(opts.null_values, vec!["N/A"]);
    }
}
