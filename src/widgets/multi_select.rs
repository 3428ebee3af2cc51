//! Bordered checklist: any number of options may be checked. Scrolls to keep the cursor visible.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

pub struct MultiSelect<'a> {
    pub title: &'a str,
    pub options: &'a [String],
    pub checked: &'a [String],
    pub cursor: usize,
    pub focused: bool,
    pub border_color: Color,
    pub active_color: Color,
}

impl<'a> MultiSelect<'a> {
    pub fn new(title: &'a str, options: &'a [String], checked: &'a [String]) -> Self {
        Self {
            title,
            options,
            checked,
            cursor: 0,
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
}

/// First visible row so that `cursor` fits in `height` rows.
fn scroll_offset(cursor: usize, height: usize) -> usize {
    if height == 0 {
        0
    } else {
        cursor.saturating_sub(height - 1)
    }
}

impl Widget for MultiSelect<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.checked.is_empty() {
            format!("{} (all)", self.title)
        } else {
            format!("{} ({})", self.title, self.checked.len())
        };
        let border = if self.focused {
            self.active_color
        } else {
            self.border_color
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(title)
            .border_style(Style::default().fg(border));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.options.is_empty() {
            Paragraph::new("(no values)")
                .style(Style::default().fg(self.border_color))
                .render(inner, buf);
            return;
        }

        let height = inner.height as usize;
        let offset = scroll_offset(self.cursor, height);
        for (row, (idx, option)) in self
            .options
            .iter()
            .enumerate()
            .skip(offset)
            .take(height)
            .enumerate()
        {
            let is_checked = self.checked.contains(option);
            let mut style = if is_checked {
                Style::default().fg(self.active_color)
            } else {
                Style::default()
            };
            if self.focused && idx == self.cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            let marker = if is_checked { "[x]" } else { "[ ]" };
            let line = Line::from(Span::styled(format!("{} {}", marker, option), style));
            let cell = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
            Paragraph::new(line).render(cell, buf);
        }
    }
}
