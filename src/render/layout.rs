use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::widgets::radio_block::RadioBlock;

/// Sidebar width in columns when the terminal is wide enough.
const SIDEBAR_WIDTH: u16 = 30;

/// Top-level layout: filter sidebar, two funnel panels, control bar (1 row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardLayout {
    pub region: Rect,
    pub company_size: Rect,
    pub email: Rect,
    pub marketing: Rect,
    pub sales: Rect,
    pub control_bar: Rect,
}

pub fn dashboard_layout(
    area: Rect,
    region_options: usize,
    email_options: usize,
) -> DashboardLayout {
    let [body, control_bar] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(1)])
        .areas(area);

    let sidebar_width = SIDEBAR_WIDTH.min(body.width / 3);
    let [sidebar, main] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(sidebar_width), Constraint::Fill(1)])
        .areas(body);

    let [region, company_size, email] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(RadioBlock::height(region_options)),
            Constraint::Fill(1),
            Constraint::Length(RadioBlock::height(email_options)),
        ])
        .areas(sidebar);

    let [marketing, sales] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .areas(main);

    DashboardLayout {
        region,
        company_size,
        email,
        marketing,
        sales,
        control_bar,
    }
}
