//! Marketing and sales conversion funnels from a CSV of leads.
//!
//! A source is loaded once ([`pipeline::SourceLoader`]), its derived columns are computed
//! ([`derive`]), and every filter change re-aggregates both funnels ([`pipeline::FunnelBoard`]).
//! The funnels are printed, exported as an image, or shown in the terminal dashboard ([`app`]).

pub mod app;
pub mod cache;
pub mod chart_export;
pub mod columns;
pub mod config;
pub mod derive;
pub mod error_display;
pub mod filter;
pub mod funnel;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod present;
pub mod render;
pub mod source;
pub mod widgets;

pub use app::{App, AppEvent, Focus};
pub use cache::CacheManager;
pub use chart_export::ChartExportFormat;
pub use columns::ColumnMapping;
pub use config::{AppConfig, ConfigManager, Theme};
pub use filter::{EmailFilter, FilterSelection, RegionFilter};
pub use funnel::{Funnel, FunnelPair};
pub use funnelboard_cli::{Args, CompressionFormat};
pub use loader::LoadOptions;
pub use pipeline::{DataSource, FunnelBoard, FunnelView, SourceLoader};
pub use source::InputSource;

/// Application name used for the config and cache directories.
pub const APP_NAME: &str = "funnelboard";
