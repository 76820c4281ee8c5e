//! Side panel listing loaded images.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget, Wrap},
};

use crate::application::services::gallery::{GallerySummary, THUMBNAIL_EDGE, fit_within};

/// Gallery panel widget.
#[derive(Debug, Clone, Copy)]
pub struct GalleryPanel<'a> {
    summary: &'a GallerySummary,
}

impl<'a> GalleryPanel<'a> {
    /// Creates a panel for `summary`.
    #[must_use]
    pub const fn new(summary: &'a GallerySummary) -> Self {
        Self { summary }
    }

    fn lines(&self) -> Vec<Line<'a>> {
        let dim = Style::default().fg(Color::DarkGray);
        let mut lines = Vec::with_capacity(self.summary.images.len() + 3);

        let kinds = self
            .summary
            .kinds
            .iter()
            .map(|(kind, count)| format!("{kind} {count}"))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(Line::from(Span::styled(
            if kinds.is_empty() {
                "no images yet".to_string()
            } else {
                kinds
            },
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "max {}x{}",
                self.summary.max_width, self.summary.max_height
            ),
            dim,
        )));
        lines.push(Line::default());

        for image in &self.summary.images {
            let (w, h) = fit_within(image.natural_width, image.natural_height, THUMBNAIL_EDGE);
            lines.push(Line::from(vec![
                Span::styled(format!("{:<5}", image.kind().key()), Style::default().fg(Color::Cyan)),
                Span::raw(image.src.clone()),
            ]));
            lines.push(Line::from(Span::styled(
                format!(
                    "      {}x{} -> {w:.0}x{h:.0}",
                    image.natural_width, image.natural_height
                ),
                dim,
            )));
        }
        lines
    }
}

impl Widget for GalleryPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(format!(" Gallery ({}) ", self.summary.images.len()));

        Paragraph::new(self.lines())
            .block(block)
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }
}
