use clap::Parser;
use color_eyre::Result;
use funnelboard::chart_export::{write_dashboard, ChartExportFormat};
use funnelboard::error_display::user_message_from_report;
use funnelboard::logging::{self, LogTarget};
use funnelboard::present::{render_json, render_text};
use funnelboard::{
    App, AppConfig, AppEvent, Args, CacheManager, ConfigManager, DataSource, FilterSelection,
    FunnelBoard, FunnelView, InputSource, LoadOptions, SourceLoader, APP_NAME,
};
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use tracing::debug;

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(
    mut terminal: DefaultTerminal,
    board: FunnelBoard,
    data: DataSource,
    selection: FilterSelection,
    config: &AppConfig,
) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let mut app = App::new(board, selection, config.chart.clone(), config.theme.theme())?
        .with_data_source(data);
    render(&mut terminal, &mut app)?;

    loop {
        if crossterm::event::poll(std::time::Duration::from_millis(25))? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(std::time::Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Crash(msg) => {
                        return Err(color_eyre::eyre::eyre!(msg));
                    }
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                match cache.clear_all() {
                    Ok(n) => println!("Cache cleared ({} file(s) removed)", n),
                    Err(e) => {
                        eprintln!("Error clearing cache: {}", e);
                        std::process::exit(1);
                    }
                }
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Configuration file written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config file: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

/// Config file layers plus command-line overrides.
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load(APP_NAME)?,
    };
    if let Some(name) = &args.freemail_column {
        config.columns.freemail = Some(name.clone());
    }
    if let Some(ttl) = args.cache_ttl {
        config.cache.ttl_secs = ttl;
    }
    if let Some(width) = args.width {
        config.chart.width = width;
    }
    if let Some(height) = args.height {
        config.chart.height = height;
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }
    config.validate()?;
    Ok(config)
}

fn log_target(args: &Args, config: &AppConfig) -> LogTarget {
    if args.is_batch() {
        return LogTarget::Stderr;
    }
    match &config.logging.file {
        Some(file) => LogTarget::File(PathBuf::from(file)),
        None => match CacheManager::new(APP_NAME) {
            Ok(cache) => LogTarget::File(cache.log_path()),
            Err(_) => LogTarget::Stderr,
        },
    }
}

fn selection_from_args(args: &Args) -> FilterSelection {
    FilterSelection::new()
        .with_region(args.region.into())
        .with_company_sizes(args.company_size.iter().cloned())
        .with_email(args.email_type.into())
}

fn data_source(args: &Args, config: &AppConfig) -> DataSource {
    let source = InputSource::parse(args.source.as_deref().unwrap_or(&config.source.url));
    let options = LoadOptions::from_args_and_config(args, &config.source);
    let mut loader = SourceLoader::new(options, config.cache.ttl()).with_refresh(args.refresh);
    if source.is_remote() {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => loader = loader.with_disk_cache(cache),
            Err(e) => debug!(error = %e, "no cache directory, downloads are not cached"),
        }
    }
    DataSource::new(source, loader, config.columns.clone())
}

fn run_batch(args: &Args, config: &AppConfig, view: &FunnelView) -> Result<()> {
    if let Some(path) = &args.export {
        let format = ChartExportFormat::resolve(path, args.export_format)?;
        let charts = view.charts(&config.chart)?;
        write_dashboard(path, format, &charts, (config.chart.width, config.chart.height))?;
        if !args.print && !args.json {
            println!("Exported funnels to {}", path.display());
        }
    }
    if args.print {
        print!("{}", render_text(&view.pair, &view.subtitle()));
    }
    if args.json {
        println!("{}", render_json(&view.pair, &view.subtitle())?);
    }
    Ok(())
}

fn start(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    logging::init(&config.logging.level, log_target(args, &config))?;
    debug!(?args, "starting");

    let mut data = data_source(args, &config);
    let board = data.load_board()?;
    let selection = selection_from_args(args);

    if args.is_batch() {
        let view = board.compute(&selection)?;
        return run_batch(args, &config, &view);
    }

    let terminal = ratatui::init();
    let result = run(terminal, board, data, selection, &config);
    ratatui::restore();
    result
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    if let Err(e) = start(&args) {
        eprintln!("Error: {}", user_message_from_report(&e));
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnelboard::{EmailFilter, RegionFilter};

    #[test]
    fn args_to_selection() {
        let args = Args::parse_from([
            "funnelboard",
            "--region",
            "non-us",
            "--company-size",
            "1-10",
            "--company-size",
            "11-50",
            "--email-type",
            "corporate",
        ]);
        let sel = selection_from_args(&args);
        assert_eq!(sel.region, RegionFilter::NonUsOnly);
        assert_eq!(sel.company_sizes, vec!["1-10", "11-50"]);
        assert_eq!(sel.email, EmailFilter::CorporateOnly);
    }

    #[test]
    fn batch_runs_log_to_stderr() {
        let args = Args::parse_from(["funnelboard", "--print"]);
        let config = AppConfig::default();
        assert!(matches!(log_target(&args, &config), LogTarget::Stderr));
    }

    #[test]
    fn cli_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chart]\nwidth = 800\n").unwrap();
        let args = Args::parse_from([
            "funnelboard",
            "--config",
            path.to_str().unwrap(),
            "--height",
            "300",
            "--freemail-column",
            "Is Freemail",
            "--cache-ttl",
            "0",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.chart.width, 800);
        assert_eq!(config.chart.height, 300);
        assert_eq!(config.columns.freemail.as_deref(), Some("Is Freemail"));
        assert_eq!(config.cache.ttl_secs, 0);
    }
}
