//! Reusable radio-button block: a bordered block listing options (● selected, ○ unselected).
//! Used for the region and email-type filters.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

/// Renders a block of radio options, one per row.
/// The selected item is drawn with ●; while focused the cursor row is reversed.
pub struct RadioBlock<'a> {
    pub title: &'a str,
    pub options: &'a [&'a str],
    pub selected: usize,
    pub cursor: usize,
    pub focused: bool,
    pub border_color: Color,
    pub active_color: Color,
}

impl<'a> RadioBlock<'a> {
    pub fn new(title: &'a str, options: &'a [&'a str], selected: usize) -> Self {
        Self {
            title,
            options,
            selected,
            cursor: selected,
            focused: false,
            border_color: Color::DarkGray,
            active_color: Color::Cyan,
        }
    }

    pub fn cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn colors(mut self, border_color: Color, active_color: Color) -> Self {
        self.border_color = border_color;
        self.active_color = active_color;
        self
    }

    /// Rows needed to show every option inside the border.
    pub fn height(options: usize) -> u16 {
        options as u16 + 2
    }

    fn render_inner(&self, area: Rect, buf: &mut Buffer) {
        if self.options.is_empty() {
            return;
        }
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(self.options.iter().map(|_| Constraint::Length(1)))
            .split(area);

        for (idx, label) in self.options.iter().enumerate() {
            let Some(cell) = rows.get(idx) else {
                break;
            };
            let is_selected = idx == self.selected;
            let marker = if is_selected { "●" } else { "○" };
            let style = if is_selected {
                Style::default().fg(self.active_color)
            } else {
                Style::default()
            };
            let style = if self.focused && idx == self.cursor {
                style.add_modifier(Modifier::REVERSED)
            } else {
                style
            };
            Paragraph::new(Line::from(Span::styled(format!("{} {}", marker, label), style)))
                .render(*cell, buf);
        }
    }
}

impl Widget for RadioBlock<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block_style = if self.focused {
            Style::default().fg(self.active_color)
        } else {
            Style::default().fg(self.border_color)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(self.title)
            .border_style(block_style);
        let inner = block.inner(area);
        block.render(area, buf);
        self.render_inner(inner, buf);
    }
}
