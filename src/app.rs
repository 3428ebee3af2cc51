//! Dashboard state: filter controls, focus, the current funnels and status line.

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::chart_export::{write_dashboard, ChartExportFormat};
use crate::config::{ChartConfig, Theme};
use crate::error_display::user_message_from_report;
use crate::filter::{EmailFilter, FilterSelection, RegionFilter};
use crate::pipeline::{DataSource, FunnelBoard, FunnelView};
use crate::present::{format_count, DashboardCharts};
use crate::render::render_dashboard;

pub enum AppEvent {
    Key(KeyEvent),
    /// Filters changed; recompute funnels.
    Recompute,
    Export,
    /// Reload the source unless the loaded copy is still fresh.
    Reload,
    /// Fetch the source again, bypassing every cache.
    Refresh,
    Exit,
    Crash(String),
    Resize(u16, u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Region,
    CompanySize,
    Email,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Region => Focus::CompanySize,
            Focus::CompanySize => Focus::Email,
            Focus::Email => Focus::Region,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Focus::Region => Focus::Email,
            Focus::CompanySize => Focus::Region,
            Focus::Email => Focus::CompanySize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    board: FunnelBoard,
    selection: FilterSelection,
    view: FunnelView,
    charts: DashboardCharts,
    data: Option<DataSource>,
    pub(crate) focus: Focus,
    pub(crate) region_cursor: usize,
    pub(crate) size_cursor: usize,
    pub(crate) email_cursor: usize,
    status: Option<StatusMessage>,
    chart: ChartConfig,
    pub(crate) theme: Theme,
}

impl App {
    pub fn new(
        board: FunnelBoard,
        selection: FilterSelection,
        chart: ChartConfig,
        theme: Theme,
    ) -> Result<App> {
        let view = board.compute(&selection)?;
        let charts = view.charts(&chart)?;
        let region_cursor = index_of(&RegionFilter::ALL, selection.region);
        let email_cursor = index_of(&EmailFilter::ALL, selection.email);
        Ok(App {
            board,
            selection,
            view,
            charts,
            data: None,
            focus: Focus::default(),
            region_cursor,
            size_cursor: 0,
            email_cursor,
            status: None,
            chart,
            theme,
        })
    }

    /// Source the board was loaded from, for reloading.
    pub fn with_data_source(mut self, data: DataSource) -> Self {
        self.data = Some(data);
        self
    }

    pub fn board(&self) -> &FunnelBoard {
        &self.board
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn view(&self) -> &FunnelView {
        &self.view
    }

    pub fn charts(&self) -> &DashboardCharts {
        &self.charts
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    fn set_status(&mut self, text: impl Into<String>, is_error: bool) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error,
        });
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Recompute => {
                self.recompute();
                None
            }
            AppEvent::Export => {
                self.export();
                None
            }
            AppEvent::Reload => {
                self.reload(false);
                None
            }
            AppEvent::Refresh => {
                self.reload(true);
                None
            }
            AppEvent::Resize(_, _) => None,
            AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        if event.kind != KeyEventKind::Press {
            return None;
        }
        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(AppEvent::Exit)
            }
            KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Exit),
            KeyCode::Tab => {
                self.focus = self.focus.next();
                None
            }
            KeyCode::BackTab => {
                self.focus = self.focus.prev();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_cursor(-1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_cursor(1);
                None
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.select_at_cursor(),
            KeyCode::Char('r') => {
                self.selection = FilterSelection::new();
                self.region_cursor = 0;
                self.email_cursor = 0;
                Some(AppEvent::Recompute)
            }
            KeyCode::Char('e') => Some(AppEvent::Export),
            KeyCode::Char('l') | KeyCode::F(5) => Some(AppEvent::Reload),
            KeyCode::Char('L') => Some(AppEvent::Refresh),
            _ => None,
        }
    }

    fn option_count(&self) -> usize {
        match self.focus {
            Focus::Region => RegionFilter::ALL.len(),
            Focus::CompanySize => self.board.company_sizes().len(),
            Focus::Email => EmailFilter::ALL.len(),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let n = self.option_count();
        if n == 0 {
            return;
        }
        let cursor = match self.focus {
            Focus::Region => &mut self.region_cursor,
            Focus::CompanySize => &mut self.size_cursor,
            Focus::Email => &mut self.email_cursor,
        };
        *cursor = (*cursor as isize + delta).clamp(0, n as isize - 1) as usize;
    }

    fn select_at_cursor(&mut self) -> Option<AppEvent> {
        let before = self.selection.clone();
        match self.focus {
            Focus::Region => self.selection.region = RegionFilter::ALL[self.region_cursor],
            Focus::Email => self.selection.email = EmailFilter::ALL[self.email_cursor],
            Focus::CompanySize => {
                let size = self.board.company_sizes().get(self.size_cursor)?.clone();
                self.selection.toggle_company_size(&size);
            }
        }
        (self.selection != before).then_some(AppEvent::Recompute)
    }

    fn recompute(&mut self) {
        let result = self
            .board
            .compute(&self.selection)
            .and_then(|view| Ok((view.charts(&self.chart)?, view)));
        match result {
            Ok((charts, view)) => {
                debug!(filters = %view.subtitle(), rows = view.rows(), "dashboard updated");
                self.view = view;
                self.charts = charts;
                self.status = None;
            }
            Err(e) => {
                warn!(error = %e, "recompute failed");
                self.set_status(user_message_from_report(&e), true);
            }
        }
    }

    fn reload(&mut self, force: bool) {
        let Some(data) = self.data.as_mut() else {
            self.set_status("Nothing to reload", true);
            return;
        };
        if !force && data.is_fresh() {
            let text = match data.fetched_at() {
                Some(at) => format!(
                    "Data is current (loaded {})",
                    at.with_timezone(&chrono::Local).format("%H:%M:%S")
                ),
                None => "Data is current".to_string(),
            };
            self.set_status(text, false);
            return;
        }
        let result = if force {
            data.refresh_board()
        } else {
            data.load_board()
        };
        match result {
            Ok(board) => {
                self.board = board;
                let sizes = self.board.company_sizes().len();
                self.size_cursor = self.size_cursor.min(sizes.saturating_sub(1));
                self.recompute();
                if self.status.is_none() {
                    let rows = self.board.total_rows();
                    info!(rows, "reloaded source");
                    self.set_status(format!("Reloaded {} rows", format_count(rows as u64)), false);
                }
            }
            Err(e) => {
                warn!(error = %e, "reload failed");
                let msg = format!("Reload failed: {}", user_message_from_report(&e));
                self.set_status(msg, true);
            }
        }
    }

    fn export(&mut self) {
        let path = PathBuf::from(&self.chart.export_path);
        let result = ChartExportFormat::resolve(&path, None).and_then(|format| {
            write_dashboard(
                &path,
                format,
                &self.charts,
                (self.chart.width, self.chart.height),
            )
        });
        match result {
            Ok(()) => self.set_status(format!("Exported funnels to {}", path.display()), false),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "export failed");
                let msg = format!("Export failed: {}", user_message_from_report(&e));
                self.set_status(msg, true);
            }
        }
    }
}

fn index_of<T: PartialEq + Copy>(all: &[T], value: T) -> usize {
    all.iter().position(|v| *v == value).unwrap_or(0)
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        render_dashboard(self, area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnMapping;
    use crate::loader::LoadOptions;
    use crate::pipeline::SourceLoader;
    use crate::source::InputSource;
    use polars::prelude::*;
    use std::time::Duration;

    fn board() -> FunnelBoard {
        let df = df!(
            "Country" => ["US", "Germany", "US", "France"],
            "Company Size" => ["1-10", "11-50", "11-50", "1-10"],
            "Email Freemail" => ["true", "false", "false", "true"],
            "Enters Lead Stage 2" => [Some("2024-01-01"), Some("2024-01-02"), None, None],
            "Enters Lead Stage 3" => [Some("2024-01-05"), None, None, None],
            "Converted to Sales Opportunity" => [true, false, false, false],
            "Enters Opportunity Stage 1" => [Some("2024-01-09"), None::<&str>, None, None],
            "Enters Opportunity Stage 2" => [None::<&str>, None, None, None],
            "Enters Opportunity Stage 3" => [None::<&str>, None, None, None],
            "Enters Opportunity Stage 4" => [None::<&str>, None, None, None],
            "Enters Opportunity Stage 5" => [None::<&str>, None, None, None],
            "Closed Won Date" => [None::<&str>, None, None, None]
        )
        .unwrap();
        FunnelBoard::new(&df, &ColumnMapping::default()).unwrap()
    }

    fn app(chart: ChartConfig) -> App {
        App::new(board(), FilterSelection::new(), chart, Theme::default()).unwrap()
    }

    const LEADS_HEADER: &str = "Country,Company Size,Email Freemail,Enters Lead Stage 2,\
Enters Lead Stage 3,Converted to Sales Opportunity,Enters Opportunity Stage 1,\
Enters Opportunity Stage 2,Enters Opportunity Stage 3,Enters Opportunity Stage 4,\
Enters Opportunity Stage 5,Closed Won Date";

    fn write_leads(path: &std::path::Path, countries: &[&str]) {
        let mut csv = format!("{}\n", LEADS_HEADER);
        for country in countries {
            csv.push_str(&format!(
                "{},1-10,true,2024-01-02,,false,,,,,,\n",
                country
            ));
        }
        std::fs::write(path, csv).unwrap();
    }

    fn app_with_source(path: &std::path::Path, ttl: Duration) -> App {
        let loader = SourceLoader::new(LoadOptions::new(), ttl);
        let mut data = DataSource::new(
            InputSource::Local(path.to_path_buf()),
            loader,
            ColumnMapping::default(),
        );
        let board = data.load_board().unwrap();
        App::new(board, FilterSelection::new(), ChartConfig::default(), Theme::default())
            .unwrap()
            .with_data_source(data)
    }

    fn press(app: &mut App, code: KeyCode) -> Option<AppEvent> {
        app.event(&AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    #[test]
    fn quit_keys_exit() {
        let mut app = app(ChartConfig::default());
        assert!(matches!(press(&mut app, KeyCode::Char('q')), Some(AppEvent::Exit)));
        assert!(matches!(press(&mut app, KeyCode::Esc), Some(AppEvent::Exit)));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(app.event(&AppEvent::Key(ctrl_c)), Some(AppEvent::Exit)));
    }

    #[test]
    fn tab_cycles_focus() {
        let mut app = app(ChartConfig::default());
        assert_eq!(app.focus(), Focus::Region);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus(), Focus::CompanySize);
        press(&mut app, KeyCode::BackTab);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.focus(), Focus::Email);
    }

    #[test]
    fn selecting_region_recomputes_funnels() {
        let mut app = app(ChartConfig::default());
        assert_eq!(app.view().rows(), 4);
        press(&mut app, KeyCode::Down);
        let next = press(&mut app, KeyCode::Char(' '));
        assert!(matches!(next, Some(AppEvent::Recompute)));
        app.event(&AppEvent::Recompute);
        assert_eq!(app.selection().region, RegionFilter::UsOnly);
        assert_eq!(app.view().rows(), 2);
        assert_eq!(app.charts().rows, 2);

        // Selecting the option that is already selected changes nothing.
        assert!(press(&mut app, KeyCode::Enter).is_none());
    }

    #[test]
    fn company_sizes_toggle_and_reset() {
        let mut app = app(ChartConfig::default());
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char(' '));
        app.event(&AppEvent::Recompute);
        assert_eq!(app.selection().company_sizes, vec!["11-50"]);
        assert_eq!(app.view().rows(), 2);

        let next = press(&mut app, KeyCode::Char('r'));
        assert!(matches!(next, Some(AppEvent::Recompute)));
        app.event(&AppEvent::Recompute);
        assert!(app.selection().is_empty());
        assert_eq!(app.view().rows(), 4);
    }

    #[test]
    fn cursor_stays_in_range() {
        let mut app = app(ChartConfig::default());
        for _ in 0..10 {
            press(&mut app, KeyCode::Down);
        }
        assert_eq!(app.region_cursor, RegionFilter::ALL.len() - 1);
        for _ in 0..10 {
            press(&mut app, KeyCode::Up);
        }
        assert_eq!(app.region_cursor, 0);
    }

    #[test]
    fn export_reports_written_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funnels.svg");
        let chart = ChartConfig {
            export_path: path.display().to_string(),
            ..ChartConfig::default()
        };
        let mut app = app(chart);
        assert!(matches!(press(&mut app, KeyCode::Char('e')), Some(AppEvent::Export)));
        app.event(&AppEvent::Export);
        let status = app.status().unwrap();
        assert!(!status.is_error, "{}", status.text);
        assert!(status.text.starts_with("Exported funnels to"));
        assert!(path.exists());
    }

    #[test]
    fn export_to_unknown_extension_is_an_error_status() {
        let chart = ChartConfig {
            export_path: "funnels.bmp".to_string(),
            ..ChartConfig::default()
        };
        let mut app = app(chart);
        app.event(&AppEvent::Export);
        let status = app.status().unwrap();
        assert!(status.is_error);
        assert!(status.text.starts_with("Export failed"));
    }

    #[test]
    fn reload_serves_fresh_copy_until_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        write_leads(&path, &["US", "Germany", "US", "France"]);
        let mut app = app_with_source(&path, Duration::from_secs(600));
        assert_eq!(app.view().rows(), 4);

        write_leads(&path, &["US", "Germany"]);
        assert!(matches!(press(&mut app, KeyCode::Char('l')), Some(AppEvent::Reload)));
        app.event(&AppEvent::Reload);
        let status = app.status().unwrap();
        assert!(!status.is_error);
        assert!(status.text.starts_with("Data is current"), "{}", status.text);
        assert_eq!(app.view().rows(), 4);

        assert!(matches!(press(&mut app, KeyCode::Char('L')), Some(AppEvent::Refresh)));
        app.event(&AppEvent::Refresh);
        assert_eq!(app.status().unwrap().text, "Reloaded 2 rows");
        assert_eq!(app.board().total_rows(), 2);
        assert_eq!(app.view().rows(), 2);
    }

    #[test]
    fn reload_after_ttl_reads_source_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        write_leads(&path, &["US", "Germany", "US"]);
        let mut app = app_with_source(&path, Duration::ZERO);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        app.event(&AppEvent::Recompute);
        assert_eq!(app.view().rows(), 2);

        write_leads(&path, &["US", "Germany", "US", "US"]);
        app.event(&AppEvent::Reload);
        assert_eq!(app.board().total_rows(), 4);
        // The selection survives a reload.
        assert_eq!(app.selection().region, RegionFilter::UsOnly);
        assert_eq!(app.view().rows(), 3);
    }

    #[test]
    fn failed_reload_keeps_current_board() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        write_leads(&path, &["US", "Germany"]);
        let mut app = app_with_source(&path, Duration::ZERO);

        std::fs::remove_file(&path).unwrap();
        app.event(&AppEvent::Reload);
        let status = app.status().unwrap();
        assert!(status.is_error);
        assert!(status.text.starts_with("Reload failed"), "{}", status.text);
        assert_eq!(app.view().rows(), 2);
    }

    #[test]
    fn reload_without_source_is_reported() {
        let mut app = app(ChartConfig::default());
        app.event(&AppEvent::Reload);
        assert_eq!(app.status().unwrap().text, "Nothing to reload");
    }

    #[test]
    fn renders_filters_and_funnels() {
        let mut app = app(ChartConfig::default());
        let area = Rect::new(0, 0, 120, 30);
        let mut buf = Buffer::empty(area);
        (&mut app).render(area, &mut buf);
        let text: String = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("Region"));
        assert!(text.contains("Company size (all)"));
        assert!(text.contains("Email type"));
        assert!(text.contains("MQLs"));
        assert!(text.contains("Rows: 4 / 4"));
    }
}
