use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

use crate::columns::ColumnMapping;
use crate::present::Rgb;
use crate::source::DEFAULT_SOURCE_URL;

const CONFIG_VERSION: &str = "0.1";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string with comments.
    /// All fields are commented out so defaults are used, but users can uncomment to override.
    pub fn generate_default_config(&self) -> String {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));

        Self::comment_all_fields(toml_str, Self::collect_all_comments())
    }

    /// Collect all field comments from section constants into a map keyed by `section.field`
    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();
        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }
        let sections: [(&str, &[(&str, &str)]); 6] = [
            ("source", SOURCE_COMMENTS),
            ("columns", COLUMNS_COMMENTS),
            ("cache", CACHE_COMMENTS),
            ("chart", CHART_COMMENTS),
            ("theme", THEME_COMMENTS),
            ("logging", LOGGING_COMMENTS),
        ];
        for (section, fields) in sections {
            for (field, comment) in fields {
                comments.insert(format!("{}.{}", section, field), comment.to_string());
            }
        }
        comments
    }

    /// Comment out all fields in TOML and add comments.
    /// Option fields that serialize to nothing are added as commented-out `# field = null`.
    fn comment_all_fields(toml: String, comments: HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# funnelboard configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_fields: HashSet<String> = HashSet::new();

        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                current_section = section.clone();
                if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header.1);
                    result.push('\n');
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                seen_fields.insert(field_path);
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        Self::add_missing_option_fields(result, &comments, &seen_fields)
    }

    /// Add Option fields that weren't serialized because they're None
    fn add_missing_option_fields(
        mut result: String,
        comments: &HashMap<String, String>,
        seen_fields: &HashSet<String>,
    ) -> String {
        for field_path in OPTION_FIELDS {
            if seen_fields.contains(*field_path) {
                continue;
            }
            let Some((section, field_name)) = field_path.split_once('.') else {
                continue;
            };
            let section_header = format!("[{}]", section);
            let Some(section_pos) = result.find(&section_header) else {
                continue;
            };
            let after_header_start = section_pos + section_header.len();
            let newline_pos = result[after_header_start..].find('\n').unwrap_or(0);
            let insert_pos = after_header_start + newline_pos + 1;

            let mut new_content = String::new();
            if let Some(comment) = comments.get(*field_path) {
                for comment_line in comment.lines() {
                    new_content.push_str("# ");
                    new_content.push_str(comment_line);
                    new_content.push('\n');
                }
            }
            new_content.push_str(&format!("# {} = null\n", field_name));
            result.insert_str(insert_pos, &new_content);
        }
        result
    }

    /// Extract section name from TOML line like "[chart]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let eq_pos = trimmed.find('=')?;
        let field_name = trimmed[..eq_pos].trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config())?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub source: SourceConfig,
    pub columns: ColumnMapping,
    pub cache: CacheConfig,
    pub chart: ChartConfig,
    pub theme: ThemeConfig,
    pub logging: LoggingConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "source",
        "# ============================================================================\n# Data Source\n# ============================================================================",
    ),
    (
        "columns",
        "# ============================================================================\n# Column Mapping\n# ============================================================================\n# Names of the source columns each funnel stage is computed from.",
    ),
    (
        "cache",
        "# ============================================================================\n# Download Cache\n# ============================================================================",
    ),
    (
        "chart",
        "# ============================================================================\n# Charts and Export\n# ============================================================================",
    ),
    (
        "theme",
        "# ============================================================================\n# Terminal Colors\n# ============================================================================\n# Named colors (\"cyan\", \"darkgray\"), hex (\"#ff0000\") or 256-color indexes (\"236\")",
    ),
    (
        "logging",
        "# ============================================================================\n# Logging\n# ============================================================================",
    ),
];

/// Option fields shown as `# field = null` in the generated template.
const OPTION_FIELDS: &[&str] = &[
    "source.delimiter",
    "source.has_header",
    "source.skip_rows",
    "source.infer_schema_length",
    "columns.freemail",
    "logging.file",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// CSV path or http(s) URL used when no SOURCE argument is given.
    pub url: String,
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub skip_rows: Option<usize>,
    pub infer_schema_length: Option<usize>,
    pub ignore_errors: bool,
    /// Values read as null. `COL=VAL` limits a value to one column.
    pub null_values: Vec<String>,
    pub timeout_secs: u64,
}

const SOURCE_COMMENTS: &[(&str, &str)] = &[
    (
        "url",
        "CSV path or http(s) URL used when no SOURCE argument is given",
    ),
    (
        "delimiter",
        "Delimiter as ASCII value (e.g. 59 for ';'). null = comma",
    ),
    (
        "has_header",
        "Whether the first row is a header. null = true",
    ),
    ("skip_rows", "Number of rows to skip before the header"),
    (
        "infer_schema_length",
        "Rows used to infer column types. null = 1000",
    ),
    (
        "ignore_errors",
        "Skip rows that fail to parse instead of failing the load",
    ),
    (
        "null_values",
        "Extra values to read as null. \"NA\" applies to all columns, \"Country=--\" to one column",
    ),
    ("timeout_secs", "HTTP download timeout in seconds"),
];

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            delimiter: None,
            has_header: None,
            skip_rows: None,
            infer_schema_length: None,
            ignore_errors: false,
            null_values: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl SourceConfig {
    pub fn merge(&mut self, other: Self) {
        let defaults = Self::default();
        if other.url != defaults.url {
            self.url = other.url;
        }
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.skip_rows.is_some() {
            self.skip_rows = other.skip_rows;
        }
        if other.infer_schema_length.is_some() {
            self.infer_schema_length = other.infer_schema_length;
        }
        if other.ignore_errors != defaults.ignore_errors {
            self.ignore_errors = other.ignore_errors;
        }
        if !other.null_values.is_empty() {
            self.null_values = other.null_values;
        }
        if other.timeout_secs != defaults.timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
    }
}

const COLUMNS_COMMENTS: &[(&str, &str)] = &[
    ("country", "Country column; \"US\" is read as \"United States\""),
    ("company_size", "Company size column used by the size filter"),
    (
        "freemail",
        "Column holding the freemail flag. null = first column whose name contains \"freemail\"",
    ),
    ("lead_stage_2", "Date the lead entered lead stage 2"),
    ("lead_stage_3", "Date the lead entered lead stage 3"),
    (
        "converted_to_opportunity",
        "Boolean column; only true counts as converted",
    ),
    ("opportunity_stage_1", "Date the opportunity entered stage 1"),
    ("opportunity_stage_2", "Date the opportunity entered stage 2"),
    ("opportunity_stage_3", "Date the opportunity entered stage 3"),
    ("opportunity_stage_4", "Date the opportunity entered stage 4"),
    ("opportunity_stage_5", "Date the opportunity entered stage 5"),
    ("closed_won", "Date the opportunity was won"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a downloaded source stays fresh. 0 disables caching.
    pub ttl_secs: u64,
}

const CACHE_COMMENTS: &[(&str, &str)] = &[(
    "ttl_secs",
    "Seconds a downloaded source stays fresh before it is fetched again\n0 disables the download cache",
)];

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn merge(&mut self, other: Self) {
        if other.ttl_secs != Self::default().ttl_secs {
            self.ttl_secs = other.ttl_secs;
        }
    }

    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }
}

/// Maximum export width/height in pixels.
pub const MAX_CHART_DIMENSION: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub marketing_color: String,
    pub sales_color: String,
    /// Where the dashboard's export key writes. Extension picks the format.
    pub export_path: String,
}

const CHART_COMMENTS: &[(&str, &str)] = &[
    ("width", "Export width in pixels (both funnels side by side)"),
    ("height", "Export height in pixels"),
    ("marketing_color", "Bar color of the marketing funnel (hex)"),
    ("sales_color", "Bar color of the sales funnel (hex)"),
    (
        "export_path",
        "File written by the export key in the dashboard (.png, .svg or .eps)",
    ),
];

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 800,
            marketing_color: "#00A376".to_string(),
            sales_color: "#00303F".to_string(),
            export_path: "funnels.png".to_string(),
        }
    }
}

impl ChartConfig {
    pub fn merge(&mut self, other: Self) {
        let defaults = Self::default();
        if other.width != defaults.width {
            self.width = other.width;
        }
        if other.height != defaults.height {
            self.height = other.height;
        }
        if other.marketing_color != defaults.marketing_color {
            self.marketing_color = other.marketing_color;
        }
        if other.sales_color != defaults.sales_color {
            self.sales_color = other.sales_color;
        }
        if other.export_path != defaults.export_path {
            self.export_path = other.export_path;
        }
    }

    pub fn marketing_rgb(&self) -> Result<Rgb> {
        parse_rgb("chart.marketing_color", &self.marketing_color)
    }

    pub fn sales_rgb(&self) -> Result<Rgb> {
        parse_rgb("chart.sales_color", &self.sales_color)
    }

    fn validate(&self) -> Result<()> {
        for (name, v) in [("width", self.width), ("height", self.height)] {
            if v == 0 || v > MAX_CHART_DIMENSION {
                return Err(eyre!(
                    "chart.{} must be between 1 and {}, got {}",
                    name,
                    MAX_CHART_DIMENSION,
                    v
                ));
            }
        }
        self.marketing_rgb()?;
        self.sales_rgb()?;
        Ok(())
    }
}

fn parse_rgb(field: &str, value: &str) -> Result<Rgb> {
    Rgb::from_hex(value)
        .ok_or_else(|| eyre!("{} must be a hex color like #00A376, got '{}'", field, value))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub keybind_hints: String,
    pub keybind_labels: String,
    pub controls_bg: String,
    pub border: String,
    pub border_active: String,
    pub error: String,
}

const THEME_COMMENTS: &[(&str, &str)] = &[
    ("keybind_hints", "Keys in the control bar"),
    ("keybind_labels", "Action labels in the control bar"),
    ("controls_bg", "Control bar background"),
    ("border", "Borders of unfocused filter controls"),
    ("border_active", "Border and selection of the focused filter control"),
    ("error", "Error messages"),
];

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            keybind_hints: "cyan".to_string(),
            keybind_labels: "white".to_string(),
            controls_bg: "236".to_string(),
            border: "darkgray".to_string(),
            border_active: "cyan".to_string(),
            error: "red".to_string(),
        }
    }
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        let defaults = Self::default();
        macro_rules! take_if_changed {
            ($($field:ident),*) => {
                $(if other.$field != defaults.$field {
                    self.$field = other.$field;
                })*
            };
        }
        take_if_changed!(
            keybind_hints,
            keybind_labels,
            controls_bg,
            border,
            border_active,
            error
        );
    }

    fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("keybind_hints", &self.keybind_hints),
            ("keybind_labels", &self.keybind_labels),
            ("controls_bg", &self.controls_bg),
            ("border", &self.border),
            ("border_active", &self.border_active),
            ("error", &self.error),
        ]
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in self.fields() {
            Color::from_str(value)
                .map_err(|_| eyre!("theme.{}: unknown color '{}'", name, value))?;
        }
        Ok(())
    }

    /// Resolved terminal colors. Call after validation; unknown names fall back to reset.
    pub fn theme(&self) -> Theme {
        let c = |s: &str| Color::from_str(s).unwrap_or(Color::Reset);
        Theme {
            keybind_hints: c(&self.keybind_hints),
            keybind_labels: c(&self.keybind_labels),
            controls_bg: c(&self.controls_bg),
            border: c(&self.border),
            border_active: c(&self.border_active),
            error: c(&self.error),
        }
    }
}

/// Terminal colors used by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub keybind_hints: Color,
    pub keybind_labels: Color,
    pub controls_bg: Color,
    pub border: Color,
    pub border_active: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        ThemeConfig::default().theme()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when FUNNELBOARD_LOG is unset.
    pub level: String,
    /// Log file used by the dashboard. null = funnelboard.log in the cache directory.
    pub file: Option<String>,
}

const LOGGING_COMMENTS: &[(&str, &str)] = &[
    (
        "level",
        "Log level when FUNNELBOARD_LOG is unset: off, error, warn, info, debug, trace",
    ),
    (
        "file",
        "Log file used while the dashboard is open. null = funnelboard.log in the cache directory",
    ),
];

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.level != Self::default().level {
            self.level = other.level;
        }
        if other.file.is_some() {
            self.file = other.file;
        }
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| eyre!("logging.level: unknown level '{}'", self.level))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            source: SourceConfig::default(),
            columns: ColumnMapping::default(),
            cache: CacheConfig::default(),
            chart: ChartConfig::default(),
            theme: ThemeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let config_path = ConfigManager::new(app_name)?.config_path("config.toml");
        Self::load_from_path(&config_path)
    }

    /// Load defaults merged with the file at `path`. A missing file means defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = AppConfig::default();
        if path.exists() {
            config.merge(Self::read_file(path)?);
        }

        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", path.display(), e))?;

        Ok(config)
    }

    fn read_file(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file at {}: {}", path.display(), e))?;

        toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file at {}: {}", path.display(), e))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        self.source.merge(other.source);
        self.columns.merge(other.columns);
        self.cache.merge(other.cache);
        self.chart.merge(other.chart);
        self.theme.merge(other.theme);
        self.logging.merge(other.logging);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with(CONFIG_VERSION) {
            return Err(eyre!(
                "Unsupported config version: {}. Expected {}.x",
                self.version,
                CONFIG_VERSION
            ));
        }
        if self.source.url.trim().is_empty() {
            return Err(eyre!("source.url must not be empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(eyre!("source.timeout_secs must be greater than 0"));
        }
        if let Some(0) = self.source.infer_schema_length {
            return Err(eyre!("source.infer_schema_length must be greater than 0 when set"));
        }
        self.columns.validate()?;
        self.chart.validate()?;
        self.theme.validate()?;
        self.logging.level_filter()?;
        Ok(())
    }
}
