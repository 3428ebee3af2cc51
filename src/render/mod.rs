pub mod layout;

use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use crate::app::{App, Focus};
use crate::filter::{EmailFilter, RegionFilter};
use crate::widgets::controls::Controls;
use crate::widgets::funnel::FunnelWidget;
use crate::widgets::multi_select::MultiSelect;
use crate::widgets::radio_block::RadioBlock;
use layout::dashboard_layout;

const REGION_LABELS: [&str; 3] = [
    RegionFilter::ALL[0].as_str(),
    RegionFilter::ALL[1].as_str(),
    RegionFilter::ALL[2].as_str(),
];

const EMAIL_LABELS: [&str; 3] = [
    EmailFilter::ALL[0].as_str(),
    EmailFilter::ALL[1].as_str(),
    EmailFilter::ALL[2].as_str(),
];

/// Draw the whole dashboard: filter sidebar, both funnels and the control bar.
pub fn render_dashboard(app: &App, area: Rect, buf: &mut Buffer) {
    let theme = &app.theme;
    let selection = app.selection();
    let l = dashboard_layout(area, REGION_LABELS.len(), EMAIL_LABELS.len());

    let region_selected = RegionFilter::ALL
        .iter()
        .position(|r| *r == selection.region)
        .unwrap_or(0);
    RadioBlock::new("Region", &REGION_LABELS, region_selected)
        .cursor(app.region_cursor)
        .focused(app.focus() == Focus::Region)
        .colors(theme.border, theme.border_active)
        .render(l.region, buf);

    MultiSelect::new(
        "Company size",
        app.board().company_sizes(),
        &selection.company_sizes,
    )
    .cursor(app.size_cursor)
    .focused(app.focus() == Focus::CompanySize)
    .colors(theme.border, theme.border_active)
    .render(l.company_size, buf);

    let email_selected = EmailFilter::ALL
        .iter()
        .position(|e| *e == selection.email)
        .unwrap_or(0);
    RadioBlock::new("Email type", &EMAIL_LABELS, email_selected)
        .cursor(app.email_cursor)
        .focused(app.focus() == Focus::Email)
        .colors(theme.border, theme.border_active)
        .render(l.email, buf);

    let [marketing, sales] = &app.charts().charts;
    FunnelWidget::new(marketing)
        .border_color(theme.border)
        .render(l.marketing, buf);
    FunnelWidget::new(sales)
        .border_color(theme.border)
        .render(l.sales, buf);

    let status = app.status();
    let controls = Controls::from_theme(theme)
        .with_rows(app.view().rows(), app.board().total_rows())
        .with_message(
            status.map(|s| s.text.as_str()),
            status.is_some_and(|s| s.is_error),
        );
    (&controls).render(l.control_bar, buf);
}
