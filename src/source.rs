//! Input source detection for local paths vs remote HTTP(S) URLs.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Published export of the lead sheet the dashboard was built around.
pub const DEFAULT_SOURCE_URL: &str = "https://docs.google.com/spreadsheets/d/1VA-ls42pPT8qEiW1KmY5S_JdVomU9C2HitGbYnwZw5U/export?format=csv&gid=1739898264";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputSource {
    Local(PathBuf),
    Http(String),
}

impl InputSource {
    /// Classifies the string as local or HTTP/HTTPS using string parsing only (no filesystem calls).
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some(after_scheme) = s.find("://") {
            let prefix = s[..after_scheme].to_lowercase();
            if prefix == "http" || prefix == "https" {
                return InputSource::Http(s.to_string());
            }
        }
        InputSource::Local(PathBuf::from(s))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, InputSource::Http(_))
    }

    /// Identity used to key cached copies of this source.
    pub fn key(&self) -> SourceKey {
        match self {
            InputSource::Local(p) => {
                let abs = std::fs::canonicalize(p).unwrap_or_else(|_| p.clone());
                SourceKey(format!("file://{}", abs.display()))
            }
            InputSource::Http(url) => SourceKey(normalize_url(url)),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Local(p) => write!(f, "{}", p.display()),
            InputSource::Http(url) => f.write_str(url),
        }
    }
}

/// Cache identity of a data source: a lowercase scheme/host URL or an absolute file URL.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SourceKey(pub String);

impl SourceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe stem for on-disk cache entries.
    pub fn file_stem(&self) -> String {
        let digest = format!("{:x}", Sha256::digest(self.0.as_bytes()));
        let readable: String = self
            .0
            .split("://")
            .nth(1)
            .unwrap_or(&self.0)
            .chars()
            .take(40)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}-{}", readable.trim_matches('_'), &digest[..16])
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase scheme and host; path and query are case-sensitive and kept as-is.
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let Some(i) = url.find("://") else {
        return url.to_string();
    };
    let scheme = url[..i].to_lowercase();
    let after = &url[i + 3..];
    let (host, rest) = match after.find(['/', '?']) {
        Some(j) => (&after[..j], &after[j..]),
        None => (after, ""),
    };
    format!("{}://{}{}", scheme, host.to_lowercase(), rest)
}

/// Returns the path segment and file extension for URL format inference.
/// The host and query string are stripped.
pub(crate) fn url_path_extension(url: &str) -> (String, Option<String>) {
    let path_part = if let Some(i) = url.find("://") {
        let after = &url[i + 3..];
        after
            .find('/')
            .map(|j| after[j + 1..].to_string())
            .unwrap_or_default()
    } else {
        String::new()
    };
    let path_part = path_part
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_string();
    let last_segment = path_part.rsplit('/').next().unwrap_or(&path_part);
    let ext = Path::new(last_segment)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    (path_part, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_source_local_path() {
        assert!(matches!(
            InputSource::parse("/tmp/leads.csv"),
            InputSource::Local(_)
        ));
        assert!(matches!(
            InputSource::parse("relative.csv"),
            InputSource::Local(_)
        ));
    }

    #[test]
    fn input_source_http() {
        match InputSource::parse("HTTPS://example.com/leads.csv") {
            InputSource::Http(u) => assert_eq!(u, "HTTPS://example.com/leads.csv"),
            _ => panic!("expected Http"),
        }
        assert!(InputSource::parse("http://host/file.csv").is_remote());
    }

    #[test]
    fn input_source_unknown_scheme_stays_local() {
        assert!(matches!(
            InputSource::parse("s3://bucket/leads.csv"),
            InputSource::Local(_)
        ));
    }

    #[test]
    fn key_normalizes_scheme_and_host() {
        let a = InputSource::parse("HTTPS://Example.COM/Export?format=csv").key();
        let b = InputSource::parse("https://example.com/Export?format=csv").key();
        assert_eq!(a, b);
        let c = InputSource::parse("https://example.com/export?format=csv").key();
        assert_ne!(a, c);
    }

    #[test]
    fn key_file_stem_is_filesystem_safe() {
        let stem = InputSource::parse(DEFAULT_SOURCE_URL).key().file_stem();
        assert!(stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        assert!(stem.starts_with("docs_google_com"));
    }

    #[test]
    fn key_file_stem_is_stable() {
        let stem = InputSource::parse("https://example.com/leads.csv").key().file_stem();
        // Leading 16 hex digits of the SHA-256 of the key
        assert_eq!(stem, "example_com_leads_csv-73bb180b3241205b");
        assert_eq!(
            stem,
            InputSource::parse("HTTPS://EXAMPLE.com/leads.csv").key().file_stem()
        );
    }

    #[test]
    fn url_path_extension_strips_query() {
        let (path, ext) = url_path_extension("https://example.com/dir/leads.csv?dl=1");
        assert_eq!(path, "dir/leads.csv");
        assert_eq!(ext.as_deref(), Some("csv"));
        let (_, ext) = url_path_extension("https://x.com/leads.csv.gz");
        assert_eq!(ext.as_deref(), Some("gz"));
        let (_, ext) = url_path_extension(DEFAULT_SOURCE_URL);
        assert_eq!(ext, None);
    }
}
