//! Load a source once, then filter and aggregate it as often as the selection changes.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use polars::prelude::DataFrame;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{CacheManager, DatasetCache};
use crate::columns::ColumnMapping;
use crate::config::ChartConfig;
use crate::derive::{derive_columns, DerivedTable};
use crate::filter::{apply_filters, company_size_options, FilterSelection};
use crate::funnel::{aggregate_pair, FunnelPair};
use crate::loader::{self, LoadOptions};
use crate::present::DashboardCharts;
use crate::source::{InputSource, SourceKey};

/// Reads the raw bytes of a source. Defaults to [`loader::read_bytes`].
pub type Fetcher = Box<dyn Fn(&InputSource, &LoadOptions) -> Result<Vec<u8>>>;

/// Loads sources through an in-memory cache and, for remote sources, an on-disk cache.
pub struct SourceLoader {
    options: LoadOptions,
    disk: Option<CacheManager>,
    memory: DatasetCache<DataFrame>,
    refresh: bool,
    fetch: Fetcher,
}

impl SourceLoader {
    pub fn new(options: LoadOptions, ttl: Duration) -> Self {
        Self {
            options,
            disk: None,
            memory: DatasetCache::new(ttl),
            refresh: false,
            fetch: Box::new(loader::read_bytes),
        }
    }

    pub fn with_disk_cache(mut self, cache: CacheManager) -> Self {
        self.disk = Some(cache);
        self
    }

    /// Ignore cached copies on the next load and replace them.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_fetcher<F>(mut self, fetch: F) -> Self
    where
        F: Fn(&InputSource, &LoadOptions) -> Result<Vec<u8>> + 'static,
    {
        self.fetch = Box::new(fetch);
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// The table for `source`, from memory while it is younger than the TTL.
    pub fn load(&mut self, source: &InputSource) -> Result<DataFrame> {
        let key = source.key();
        if self.refresh {
            self.memory.invalidate(&key);
        }
        let Self {
            options,
            disk,
            memory,
            refresh,
            fetch,
        } = self;
        let ttl = memory.ttl();
        let df = memory
            .get_or_load(&key, || {
                fetch_and_parse(source, &key, options, disk.as_ref(), ttl, *refresh, fetch)
            })?
            .clone();
        self.refresh = false;
        Ok(df)
    }

    /// Load `source` again, bypassing both caches and replacing their entries.
    pub fn refresh(&mut self, source: &InputSource) -> Result<DataFrame> {
        self.refresh = true;
        self.load(source)
    }

    /// True while the in-memory copy of `source` is younger than the TTL.
    pub fn is_fresh(&self, source: &InputSource) -> bool {
        self.memory.is_fresh_at(&source.key(), Utc::now())
    }

    pub fn fetched_at(&self, source: &InputSource) -> Option<DateTime<Utc>> {
        self.memory.fetched_at(&source.key())
    }

    /// Drop the in-memory copy of `source` so the next load reads it again.
    pub fn invalidate(&mut self, source: &InputSource) -> bool {
        self.memory.invalidate(&source.key())
    }
}

fn fetch_and_parse(
    source: &InputSource,
    key: &SourceKey,
    options: &LoadOptions,
    disk: Option<&CacheManager>,
    ttl: Duration,
    refresh: bool,
    fetch: &Fetcher,
) -> Result<DataFrame> {
    let bytes = match (source, disk) {
        (InputSource::Http(_), Some(disk)) if !ttl.is_zero() => {
            let now = Utc::now();
            let cached = if refresh {
                None
            } else {
                disk.read_source(key, ttl, now)?
            };
            match cached {
                Some(hit) => hit.body,
                None => {
                    let body = fetch(source, options)?;
                    if let Err(e) = disk.write_source(key, &body, now) {
                        warn!(source = %key, error = %e, "could not write source to cache");
                    }
                    body
                }
            }
        }
        _ => fetch(source, options)?,
    };
    loader::parse_source_bytes(source, bytes, options)
}

/// A source with the loader that reads it and the column mapping its table is derived with.
pub struct DataSource {
    pub source: InputSource,
    pub loader: SourceLoader,
    pub columns: ColumnMapping,
}

impl DataSource {
    pub fn new(source: InputSource, loader: SourceLoader, columns: ColumnMapping) -> Self {
        Self {
            source,
            loader,
            columns,
        }
    }

    pub fn load_board(&mut self) -> Result<FunnelBoard> {
        let df = self.loader.load(&self.source)?;
        FunnelBoard::new(&df, &self.columns)
    }

    pub fn refresh_board(&mut self) -> Result<FunnelBoard> {
        let df = self.loader.refresh(&self.source)?;
        FunnelBoard::new(&df, &self.columns)
    }

    pub fn is_fresh(&self) -> bool {
        self.loader.is_fresh(&self.source)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.loader.fetched_at(&self.source)
    }
}

/// A derived lead table ready to be filtered.
#[derive(Debug, Clone)]
pub struct FunnelBoard {
    table: DerivedTable,
    company_sizes: Vec<String>,
}

/// Funnels for one filter selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelView {
    pub selection: FilterSelection,
    pub pair: FunnelPair,
}

impl FunnelView {
    pub fn subtitle(&self) -> String {
        self.selection.describe()
    }

    pub fn rows(&self) -> usize {
        self.pair.rows
    }

    pub fn charts(&self, chart: &ChartConfig) -> Result<DashboardCharts> {
        DashboardCharts::new(&self.pair, &self.subtitle(), chart)
    }
}

impl FunnelBoard {
    pub fn new(df: &DataFrame, mapping: &ColumnMapping) -> Result<Self> {
        let table = derive_columns(df, mapping)?;
        let company_sizes = company_size_options(&table)?;
        debug!(
            rows = table.height(),
            company_sizes = company_sizes.len(),
            "funnel board ready"
        );
        Ok(Self {
            table,
            company_sizes,
        })
    }

    pub fn table(&self) -> &DerivedTable {
        &self.table
    }

    pub fn total_rows(&self) -> usize {
        self.table.height()
    }

    /// Distinct company sizes in order of first appearance.
    pub fn company_sizes(&self) -> &[String] {
        &self.company_sizes
    }

    pub fn filtered(&self, selection: &FilterSelection) -> Result<DataFrame> {
        apply_filters(&self.table, selection)
    }

    pub fn compute(&self, selection: &FilterSelection) -> Result<FunnelView> {
        for size in &selection.company_sizes {
            if !self.company_sizes.contains(size) {
                warn!(company_size = %size, "company size does not occur in the data");
            }
        }
        let filtered = self.filtered(selection)?;
        let pair = aggregate_pair(&filtered)?;
        debug!(filters = %selection.describe(), rows = pair.rows, "computed funnels");
        Ok(FunnelView {
            selection: selection.clone(),
            pair,
        })
    }
}
