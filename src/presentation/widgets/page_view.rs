//! Scaled drawing of the simulated page.

use ratatui::{
    buffer::Buffer,
    layout::Rect as Area,
    style::{Color, Modifier, Style},
    widgets::{Block, BorderType, Borders, Widget},
};

use crate::domain::entities::{ElementId, LoadState, Rect, Viewport};

/// One element as drawn.
#[derive(Debug, Clone, Copy)]
pub struct ElementBox {
    /// Element id, shown as the box title.
    pub id: ElementId,
    /// Position relative to the viewport.
    pub rect: Rect,
    /// Load state, shown as the border color.
    pub state: LoadState,
}

/// Border color for a load state.
#[must_use]
pub const fn state_color(state: LoadState) -> Color {
    match state {
        LoadState::Idle => Color::DarkGray,
        LoadState::Loading => Color::Yellow,
        LoadState::Loaded => Color::Green,
        LoadState::Errored => Color::Red,
    }
}

/// Maps `rect` in page pixels onto `area` in terminal cells. Parts outside
/// the viewport are clipped; fully hidden rects yield `None`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn project(rect: &Rect, viewport: &Viewport, area: Area) -> Option<Area> {
    if area.width == 0 || area.height == 0 || viewport.width <= 0.0 || viewport.height <= 0.0 {
        return None;
    }
    let clipped = rect.intersection(&viewport.bounds())?;

    let sx = f64::from(area.width) / viewport.width;
    let sy = f64::from(area.height) / viewport.height;

    let x = (clipped.left * sx).floor() as u16;
    let y = (clipped.top * sy).floor() as u16;
    let right = ((clipped.right() * sx).ceil() as u16).min(area.width);
    let bottom = ((clipped.bottom() * sy).ceil() as u16).min(area.height);

    let x = x.min(area.width - 1);
    let y = y.min(area.height - 1);
    Some(Area::new(
        area.x + x,
        area.y + y,
        right.saturating_sub(x).max(1),
        bottom.saturating_sub(y).max(1),
    ))
}

/// Page widget.
#[derive(Debug, Clone)]
pub struct PageView<'a> {
    viewport: Viewport,
    elements: &'a [ElementBox],
    title: &'a str,
}

impl<'a> PageView<'a> {
    /// Creates a view of `elements` inside `viewport`.
    #[must_use]
    pub const fn new(viewport: Viewport, elements: &'a [ElementBox]) -> Self {
        Self {
            viewport,
            elements,
            title: "",
        }
    }

    /// Sets the frame title.
    #[must_use]
    pub const fn title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }
}

impl Widget for PageView<'_> {
    fn render(self, area: Area, buf: &mut Buffer) {
        let frame = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Gray))
            .title(format!(" {} ", self.title));
        let inner = frame.inner(area);
        frame.render(area, buf);

        for element in self.elements {
            let Some(cell) = project(&element.rect, &self.viewport, inner) else {
                continue;
            };
            let color = state_color(element.state);
            let mut block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color));
            if cell.width > 4 {
                block = block.title(element.id.to_string()).title_style(
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                );
            }
            block.render(cell, buf);
        }
    }
}
