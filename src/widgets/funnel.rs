//! Terminal funnel: one centered horizontal bar per stage, width proportional to its count.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, BorderType, Borders, Widget},
};

use crate::present::FunnelChart;

/// Columns reserved for stage names left of the bars.
const MAX_NAME_WIDTH: u16 = 22;

pub struct FunnelWidget<'a> {
    chart: &'a FunnelChart,
    border_color: Color,
}

impl<'a> FunnelWidget<'a> {
    pub fn new(chart: &'a FunnelChart) -> Self {
        Self {
            chart,
            border_color: Color::DarkGray,
        }
    }

    pub fn border_color(mut self, color: Color) -> Self {
        self.border_color = color;
        self
    }
}

/// Cells of a bar of `fraction` width in `width` columns. Non-zero counts get at least one cell.
fn bar_cells(fraction: f64, width: u16) -> u16 {
    if fraction <= 0.0 {
        return 0;
    }
    ((fraction * width as f64).round() as u16).clamp(1, width)
}

impl Widget for FunnelWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(self.chart.title.as_str())
            .border_style(Style::default().fg(self.border_color));
        let inner = block.inner(area);
        block.render(area, buf);

        let n = self.chart.len() as u16;
        if n == 0 || inner.height == 0 || inner.width < 4 {
            return;
        }

        let name_width = self
            .chart
            .stages
            .iter()
            .map(|s| s.chars().count() as u16 + 1)
            .max()
            .unwrap_or(0)
            .min(MAX_NAME_WIDTH)
            .min(inner.width / 3);
        let bar_area_x = inner.x + name_width;
        let bar_area_w = inner.width - name_width;
        // 1 blank line between stages when there is room, bars at most 3 rows tall
        let row_h = (inner.height / n).clamp(1, 4);
        let bar_h = if row_h > 1 { row_h - 1 } else { 1 };

        let crate::present::Rgb(r, g, b) = self.chart.color;
        let bar_color = Color::Rgb(r, g, b);

        for i in 0..self.chart.len() {
            let top = inner.y + i as u16 * row_h;
            if top >= inner.bottom() {
                break;
            }
            let bar_h = bar_h.min(inner.bottom() - top);

            buf.set_stringn(
                inner.x,
                top,
                &self.chart.stages[i],
                name_width.saturating_sub(1) as usize,
                Style::default(),
            );

            let fraction = self.chart.width_fraction(i);
            let cells = bar_cells(fraction, bar_area_w);
            let bar_x = bar_area_x + (bar_area_w - cells) / 2;
            if cells > 0 {
                buf.set_style(
                    Rect::new(bar_x, top, cells, bar_h),
                    Style::default().bg(bar_color),
                );
            }

            let span = BarSpan {
                area_x: bar_area_x,
                area_w: bar_area_w,
                bar_x,
                bar_w: cells,
                color: bar_color,
            };
            if bar_h < 2 {
                let joined = self.chart.labels[i].replace('\n', " ");
                span.draw_label(buf, &joined, top);
            } else {
                for (j, line) in self.chart.labels[i].lines().take(bar_h as usize).enumerate() {
                    span.draw_label(buf, line, top + j as u16);
                }
            }
        }
    }
}

/// Horizontal placement of one stage's bar within the bar area.
struct BarSpan {
    area_x: u16,
    area_w: u16,
    bar_x: u16,
    bar_w: u16,
    color: Color,
}

impl BarSpan {
    /// Center `text` over the bar area; cells that land on the bar keep the bar as background.
    fn draw_label(&self, buf: &mut Buffer, text: &str, y: u16) {
        let len = (text.chars().count() as u16).min(self.area_w);
        let start = self.area_x + (self.area_w - len) / 2;
        for (k, ch) in text.chars().take(len as usize).enumerate() {
            let x = start + k as u16;
            let on_bar = x >= self.bar_x && x < self.bar_x + self.bar_w;
            let style = if on_bar {
                Style::default().fg(Color::White).bg(self.color)
            } else {
                Style::default()
            };
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_char(ch).set_style(style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::funnel_from_counts;
    use crate::present::{FunnelChart, Rgb};

    #[test]
    fn bar_cells_scale_with_fraction() {
        assert_eq!(bar_cells(0.0, 40), 0);
        assert_eq!(bar_cells(1.0, 40), 40);
        assert_eq!(bar_cells(0.5, 40), 20);
        assert_eq!(bar_cells(0.001, 40), 1);
    }

    #[test]
    fn renders_stage_names_and_labels() {
        let f = funnel_from_counts("Marketing", &["MQLs", "Lead Stage 2"], &[10, 5]);
        let chart = FunnelChart::from_funnel(&f, Rgb(0, 163, 118));
        let area = Rect::new(0, 0, 50, 10);
        let mut buf = Buffer::empty(area);
        FunnelWidget::new(&chart).render(area, &mut buf);
        let text: String = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("Marketing"));
        assert!(text.contains("MQLs"));
        assert!(text.contains("Lead Stage 2"));
        assert!(text.contains("(100%)"));
        assert!(text.contains("(50%)"));
    }
}
