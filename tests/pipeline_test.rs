use chrono::{Duration as ChronoDuration, Utc};
use color_eyre::eyre::eyre;
use funnelboard::funnel::Ratio;
use funnelboard::present::{render_json, render_text};
use funnelboard::{
    CacheManager, ColumnMapping, EmailFilter, FilterSelection, FunnelBoard, InputSource,
    LoadOptions, RegionFilter, SourceLoader,
};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

mod common;

fn sample_board() -> FunnelBoard {
    let dir = TempDir::new().unwrap();
    let path = common::write_sample_csv(dir.path(), "leads.csv");
    let mut loader = SourceLoader::new(LoadOptions::new(), Duration::from_secs(60));
    let df = loader
        .load(&InputSource::Local(path))
        .expect("sample csv should load");
    FunnelBoard::new(&df, &ColumnMapping::default()).unwrap()
}

fn percents(ratios: &[Ratio]) -> Vec<String> {
    ratios
        .iter()
        .map(|r| funnelboard::present::format_percent(*r))
        .collect()
}

#[test]
fn unfiltered_sample_funnels() {
    let board = sample_board();
    assert_eq!(board.total_rows(), 10);

    let view = board.compute(&FilterSelection::new()).unwrap();
    assert_eq!(view.rows(), 10);
    assert_eq!(view.pair.marketing.counts(), vec![10, 6, 4, 3]);
    assert_eq!(view.pair.sales.counts(), vec![3, 3, 2, 1, 1, 1]);

    let marketing: Vec<Ratio> = view
        .pair
        .marketing
        .stages
        .iter()
        .map(|s| s.percent_of_previous)
        .collect();
    assert_eq!(
        percents(&marketing),
        vec!["(100%)", "(60%)", "(67%)", "(75%)"]
    );
}

#[test]
fn region_filters_partition_rows() {
    let board = sample_board();
    let us = board
        .compute(&FilterSelection::new().with_region(RegionFilter::UsOnly))
        .unwrap();
    let non_us = board
        .compute(&FilterSelection::new().with_region(RegionFilter::NonUsOnly))
        .unwrap();
    assert_eq!(us.rows(), 4);
    // Missing country counts as outside the US.
    assert_eq!(non_us.rows(), 6);
    assert_eq!(us.rows() + non_us.rows(), board.total_rows());
    assert_eq!(us.pair.marketing.counts(), vec![4, 3, 2, 2]);
}

#[test]
fn filters_combine_and_never_add_rows() {
    let board = sample_board();
    let all = board.compute(&FilterSelection::new()).unwrap().rows();
    let selections = [
        FilterSelection::new().with_email(EmailFilter::FreemailOnly),
        FilterSelection::new().with_email(EmailFilter::CorporateOnly),
        FilterSelection::new().with_company_sizes(["1-10"]),
        FilterSelection::new()
            .with_region(RegionFilter::UsOnly)
            .with_company_sizes(["1-10", "11-50"])
            .with_email(EmailFilter::CorporateOnly),
    ];
    let rows: Vec<usize> = selections
        .iter()
        .map(|s| board.compute(s).unwrap().rows())
        .collect();
    assert!(rows.iter().all(|&r| r <= all));
    assert_eq!(rows, vec![5, 5, 4, 1]);
}

#[test]
fn company_sizes_in_first_seen_order() {
    let board = sample_board();
    assert_eq!(board.company_sizes(), &["1-10", "11-50", "51-200"]);
}

#[test]
fn empty_selection_shows_undefined_ratios() {
    let board = sample_board();
    let view = board
        .compute(&FilterSelection::new().with_company_sizes(["5000+"]))
        .unwrap();
    assert_eq!(view.rows(), 0);
    assert_eq!(view.pair.marketing.counts(), vec![0, 0, 0, 0]);
    let text = render_text(&view.pair, &view.subtitle());
    assert!(text.contains("(n/a)"));

    let json: serde_json::Value =
        serde_json::from_str(&render_json(&view.pair, &view.subtitle()).unwrap()).unwrap();
    assert_eq!(json["rows"], 0);
    assert!(json["marketing"]["stages"][1]["percent_of_previous"].is_null());
}

#[test]
fn loader_reuses_loaded_table() {
    let dir = TempDir::new().unwrap();
    let path = common::write_sample_csv(dir.path(), "leads.csv");
    let source = InputSource::Local(path.clone());
    let mut loader = SourceLoader::new(LoadOptions::new(), Duration::from_secs(600));
    assert_eq!(loader.load(&source).unwrap().height(), 10);

    // The cached frame is served even after the file changes.
    std::fs::write(&path, format!("{}\n{}\n", common::HEADER, common::SAMPLE_ROWS[0])).unwrap();
    assert_eq!(loader.load(&source).unwrap().height(), 10);

    assert!(loader.invalidate(&source));
    assert_eq!(loader.load(&source).unwrap().height(), 1);
}

#[test]
fn missing_freemail_column_fails_board() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leads.csv");
    let csv = common::sample_csv().replace("Email Freemail", "Email Type");
    std::fs::write(&path, csv).unwrap();
    let df = funnelboard::loader::load(&InputSource::Local(path), &LoadOptions::new()).unwrap();
    let err = FunnelBoard::new(&df, &ColumnMapping::default()).unwrap_err();
    assert!(err.to_string().contains("freemail"));
}

const REMOTE: &str = "https://example.com/leads.csv";

/// First `n` sample leads as CSV.
fn leads_csv(n: usize) -> String {
    let mut out = format!("{}\n", common::HEADER);
    for row in &common::SAMPLE_ROWS[..n] {
        out.push_str(row);
        out.push('\n');
    }
    out
}

/// Loader for `REMOTE` that serves `body` and counts downloads.
fn counting_loader(
    cache: CacheManager,
    ttl: Duration,
    body: String,
) -> (SourceLoader, Rc<Cell<usize>>) {
    let fetches = Rc::new(Cell::new(0));
    let counter = Rc::clone(&fetches);
    let loader = SourceLoader::new(LoadOptions::new(), ttl)
        .with_disk_cache(cache)
        .with_fetcher(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(body.clone().into_bytes())
        });
    (loader, fetches)
}

#[test]
fn fresh_disk_copy_is_used_instead_of_downloading() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::with_dir(dir.path().to_path_buf());
    let source = InputSource::parse(REMOTE);
    cache
        .write_source(&source.key(), leads_csv(3).as_bytes(), Utc::now())
        .unwrap();

    let (mut loader, fetches) = counting_loader(cache, Duration::from_secs(3600), leads_csv(10));
    assert_eq!(loader.load(&source).unwrap().height(), 3);
    assert_eq!(fetches.get(), 0);
}

#[test]
fn stale_disk_copy_is_downloaded_again_and_replaced() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::with_dir(dir.path().to_path_buf());
    let source = InputSource::parse(REMOTE);
    let two_hours_ago = Utc::now() - ChronoDuration::hours(2);
    cache
        .write_source(&source.key(), leads_csv(3).as_bytes(), two_hours_ago)
        .unwrap();

    let ttl = Duration::from_secs(3600);
    let (mut loader, fetches) = counting_loader(cache.clone(), ttl, leads_csv(10));
    assert_eq!(loader.load(&source).unwrap().height(), 10);
    assert_eq!(fetches.get(), 1);

    let stored = cache.read_source(&source.key(), ttl, Utc::now()).unwrap().unwrap();
    assert_eq!(stored.body, leads_csv(10).into_bytes());

    // Served from memory now.
    assert_eq!(loader.load(&source).unwrap().height(), 10);
    assert_eq!(fetches.get(), 1);
}

#[test]
fn refresh_bypasses_fresh_copies_and_replaces_them() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::with_dir(dir.path().to_path_buf());
    let source = InputSource::parse(REMOTE);
    cache
        .write_source(&source.key(), leads_csv(3).as_bytes(), Utc::now())
        .unwrap();

    let ttl = Duration::from_secs(3600);
    let (loader, fetches) = counting_loader(cache.clone(), ttl, leads_csv(10));
    let mut loader = loader.with_refresh(true);
    assert_eq!(loader.load(&source).unwrap().height(), 10);
    assert_eq!(fetches.get(), 1);
    let stored = cache.read_source(&source.key(), ttl, Utc::now()).unwrap().unwrap();
    assert_eq!(stored.body.len(), leads_csv(10).len());

    // Refresh applies to one load only.
    loader.load(&source).unwrap();
    assert_eq!(fetches.get(), 1);

    loader.refresh(&source).unwrap();
    assert_eq!(fetches.get(), 2);
}

#[test]
fn cache_write_failure_still_loads() {
    let dir = TempDir::new().unwrap();
    // A regular file where the cache directory should be.
    let blocked = dir.path().join("cache");
    std::fs::write(&blocked, "not a directory").unwrap();
    let cache = CacheManager::with_dir(blocked);

    let (mut loader, fetches) = counting_loader(cache, Duration::from_secs(3600), leads_csv(4));
    assert_eq!(loader.load(&InputSource::parse(REMOTE)).unwrap().height(), 4);
    assert_eq!(fetches.get(), 1);
}

#[test]
fn zero_ttl_skips_disk_cache() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::with_dir(dir.path().to_path_buf());
    let source = InputSource::parse(REMOTE);
    let (mut loader, fetches) = counting_loader(cache.clone(), Duration::ZERO, leads_csv(2));
    loader.load(&source).unwrap();
    loader.load(&source).unwrap();
    assert_eq!(fetches.get(), 2);
    assert_eq!(cache.clear_all().unwrap(), 0);
}

#[test]
fn failed_download_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::with_dir(dir.path().to_path_buf());
    let mut loader = SourceLoader::new(LoadOptions::new(), Duration::from_secs(3600))
        .with_disk_cache(cache.clone())
        .with_fetcher(|_, _| Err(eyre!("Server returned 404 Not Found. Check the URL.")));
    let err = loader.load(&InputSource::parse(REMOTE)).unwrap_err();
    assert!(err.to_string().contains("404"));
    assert_eq!(cache.clear_all().unwrap(), 0);
}
