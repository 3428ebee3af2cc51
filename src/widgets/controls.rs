use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Paragraph, Widget},
};

use crate::config::Theme;
use crate::present::format_count;

const DEFAULT_CONTROLS: [(&str, &str); 7] = [
    ("Tab", "Next"),
    ("↑↓", "Move"),
    ("Space", "Select"),
    ("r", "Reset"),
    ("l", "Reload"),
    ("e", "Export"),
    ("q", "Quit"),
];

/// Bottom bar: key hints on the left, a status message when set, row counts on the right.
pub struct Controls {
    pub rows: Option<(usize, usize)>,
    pub message: Option<String>,
    pub message_is_error: bool,
    pub bg_color: Color,
    pub key_color: Color,   // Keys in the toolbar
    pub label_color: Color, // Action labels
    pub error_color: Color,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            rows: None,
            message: None,
            message_is_error: false,
            bg_color: Color::Indexed(236),
            key_color: Color::Cyan,
            label_color: Color::White,
            error_color: Color::Red,
        }
    }
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_theme(theme: &Theme) -> Self {
        Self {
            bg_color: theme.controls_bg,
            key_color: theme.keybind_hints,
            label_color: theme.keybind_labels,
            error_color: theme.error,
            ..Self::default()
        }
    }

    /// Filtered rows out of all loaded rows.
    pub fn with_rows(mut self, filtered: usize, total: usize) -> Self {
        self.rows = Some((filtered, total));
        self
    }

    pub fn with_message(mut self, message: Option<&str>, is_error: bool) -> Self {
        self.message = message.map(str::to_string);
        self.message_is_error = is_error;
        self
    }

    fn rows_text(&self) -> Option<String> {
        self.rows.map(|(filtered, total)| {
            format!("Rows: {} / {}", format_count(filtered as u64), format_count(total as u64))
        })
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let no_bg = self.bg_color == Color::Reset;
        if !no_bg {
            Block::default()
                .style(Style::default().bg(self.bg_color))
                .render(area, buf);
        }

        // Width of one key-label pair: key + 1 trailing space, label + 1 trailing space.
        let pair_width = |(key, action): &(&str, &str)| -> u16 {
            (key.chars().count() as u16 + 1) + (action.chars().count() as u16 + 1)
        };

        let rows_text = self.rows_text();
        let right_reserved = rows_text
            .as_ref()
            .map(|t| t.chars().count() as u16 + 1)
            .unwrap_or(1);
        let mut available = area.width.saturating_sub(right_reserved);

        let mut n_show = 0;
        for pair in DEFAULT_CONTROLS.iter() {
            let need = pair_width(pair);
            if available >= need {
                available -= need;
                n_show += 1;
            } else {
                break;
            }
        }

        let mut constraints: Vec<Constraint> = DEFAULT_CONTROLS
            .iter()
            .take(n_show)
            .flat_map(|(key, action)| {
                [
                    Constraint::Length(key.chars().count() as u16 + 1),
                    Constraint::Length(action.chars().count() as u16 + 1),
                ]
            })
            .collect();
        constraints.push(Constraint::Fill(1));
        constraints.push(Constraint::Length(right_reserved));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let base = if no_bg {
            Style::default()
        } else {
            Style::default().bg(self.bg_color)
        };
        let key_style = base.fg(self.key_color);
        let label_style = base.fg(self.label_color);

        for (i, (key, action)) in DEFAULT_CONTROLS.iter().take(n_show).enumerate() {
            let j = i * 2;
            Paragraph::new(*key).style(key_style).render(layout[j], buf);
            Paragraph::new(*action)
                .style(label_style)
                .render(layout[j + 1], buf);
        }

        let fill_idx = n_show * 2;
        let message_style = if self.message_is_error {
            base.fg(self.error_color)
        } else {
            label_style
        };
        Paragraph::new(self.message.as_deref().unwrap_or(""))
            .style(message_style)
            .render(layout[fill_idx], buf);

        if let Some(text) = rows_text {
            Paragraph::new(text)
                .style(label_style)
                .right_aligned()
                .render(layout[fill_idx + 1], buf);
        }
    }
}
