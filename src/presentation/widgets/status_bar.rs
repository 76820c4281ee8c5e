//! Status bar widget.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::domain::entities::LoadState;

/// Status bar severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    /// Informational.
    Info,
    /// Everything tracked has loaded.
    Success,
    /// Some loads failed.
    Warning,
}

impl StatusLevel {
    /// Returns color for level.
    #[must_use]
    pub const fn color(self) -> Color {
        match self {
            Self::Info => Color::Cyan,
            Self::Success => Color::Green,
            Self::Warning => Color::Yellow,
        }
    }
}

/// Number of tracked elements per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    /// Not started.
    pub idle: usize,
    /// In flight.
    pub loading: usize,
    /// Loaded.
    pub loaded: usize,
    /// Failed.
    pub errored: usize,
}

impl LoadCounts {
    /// Tallies states.
    #[must_use]
    pub fn tally(states: impl IntoIterator<Item = LoadState>) -> Self {
        let mut counts = Self::default();
        for state in states {
            match state {
                LoadState::Idle => counts.idle += 1,
                LoadState::Loading => counts.loading += 1,
                LoadState::Loaded => counts.loaded += 1,
                LoadState::Errored => counts.errored += 1,
            }
        }
        counts
    }

    /// Total tracked.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.idle + self.loading + self.loaded + self.errored
    }

    /// Severity for the bar.
    #[must_use]
    pub const fn level(&self) -> StatusLevel {
        if self.errored > 0 {
            StatusLevel::Warning
        } else if self.total() > 0 && self.loaded == self.total() {
            StatusLevel::Success
        } else {
            StatusLevel::Info
        }
    }
}

impl std::fmt::Display for LoadCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} loaded, {} loading, {} idle, {} failed",
            self.loaded,
            self.total(),
            self.loading,
            self.idle,
            self.errored
        )
    }
}

/// Status bar widget.
#[derive(Debug, Clone)]
pub struct StatusBar {
    left: String,
    center: String,
    right: String,
    level: StatusLevel,
}

impl StatusBar {
    /// Creates empty status bar.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            left: String::new(),
            center: String::new(),
            right: String::new(),
            level: StatusLevel::Info,
        }
    }

    /// Bar summarizing load progress on the left.
    #[must_use]
    pub fn from_counts(counts: LoadCounts) -> Self {
        Self::new().left(counts.to_string()).level(counts.level())
    }

    /// Sets left content.
    #[must_use]
    pub fn left(mut self, content: impl Into<String>) -> Self {
        self.left = content.into();
        self
    }

    /// Sets center content.
    #[must_use]
    pub fn center(mut self, content: impl Into<String>) -> Self {
        self.center = content.into();
        self
    }

    /// Sets right content.
    #[must_use]
    pub fn right(mut self, content: impl Into<String>) -> Self {
        self.right = content.into();
        self
    }

    /// Sets status level.
    #[must_use]
    pub const fn level(mut self, level: StatusLevel) -> Self {
        self.level = level;
        self
    }
}

impl Default for StatusBar {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &StatusBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default()
            .fg(self.level.color())
            .add_modifier(Modifier::BOLD);
        let dim = Style::default().fg(Color::DarkGray);

        let width = area.width as usize;
        let left_len = self.left.chars().count();
        let center_len = self.center.chars().count();
        let right_len = self.right.chars().count();

        let center_start = width.saturating_sub(center_len) / 2;
        let right_start = width.saturating_sub(right_len);

        let mut spans = vec![Span::styled(&self.left, style)];

        let left_padding = center_start.saturating_sub(left_len);
        if left_padding > 0 {
            spans.push(Span::raw(" ".repeat(left_padding)));
        }
        if !self.center.is_empty() {
            spans.push(Span::styled(&self.center, dim));
        }

        let current_len = left_len + left_padding + center_len;
        let right_padding = right_start.saturating_sub(current_len);
        if right_padding > 0 {
            spans.push(Span::raw(" ".repeat(right_padding)));
        }
        if !self.right.is_empty() {
            spans.push(Span::styled(&self.right, style));
        }

        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_and_level() {
        let counts = LoadCounts::tally([LoadState::Loaded, LoadState::Idle, LoadState::Loaded]);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.level(), StatusLevel::Info);
        assert_eq!(counts.to_string(), "2/3 loaded, 0 loading, 1 idle, 0 failed");

        let done = LoadCounts::tally([LoadState::Loaded]);
        assert_eq!(done.level(), StatusLevel::Success);

        let failed = LoadCounts::tally([LoadState::Loaded, LoadState::Errored]);
        assert_eq!(failed.level(), StatusLevel::Warning);

        assert_eq!(LoadCounts::default().level(), StatusLevel::Info);
    }

    #[test]
    fn test_render_sections() {
        let bar = StatusBar::new().left("L").center("C").right("R");
        let area = Rect::new(0, 0, 11, 1);
        let mut buf = Buffer::empty(area);
        (&bar).render(area, &mut buf);

        assert_eq!(buf[(0, 0)].symbol(), "L");
        assert_eq!(buf[(5, 0)].symbol(), "C");
        assert_eq!(buf[(10, 0)].symbol(), "R");
    }
}
