//! Main application orchestrator.

use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream, KeyEvent};
use futures_util::StreamExt;
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use tokio::time::interval;
use tracing::{debug, info};

use crate::application::services::{GalleryFilter, GallerySummary};
use crate::infrastructure::config::ViewerConfig;
use crate::presentation::events::{ViewerCommand, map_key};
use crate::presentation::widgets::{GalleryPanel, PageView, StatusBar};

use super::session::PageSession;

const MIN_TICK: Duration = Duration::from_millis(10);

/// Interactive page viewer.
#[derive(Debug)]
pub struct ViewerApp {
    session: PageSession,
    title: String,
    scroll_step: f64,
    tick_rate: Duration,
    show_gallery: bool,
    gallery_filter: GalleryFilter,
    last_action: String,
    running: bool,
}

impl ViewerApp {
    /// Creates a viewer over `session`.
    #[must_use]
    pub fn new(session: PageSession, config: &ViewerConfig) -> Self {
        let title = session
            .host()
            .model()
            .title
            .unwrap_or_else(|| "page".to_string());
        Self {
            session,
            title,
            scroll_step: config.scroll_step,
            tick_rate: Duration::from_millis(config.tick_ms).max(MIN_TICK),
            show_gallery: false,
            gallery_filter: super::gallery_filter(config),
            last_action: String::new(),
            running: true,
        }
    }

    /// Runs the viewer until the user quits.
    ///
    /// # Errors
    ///
    /// Returns an error if drawing to the terminal fails.
    pub async fn run(mut self, terminal: &mut DefaultTerminal) -> color_eyre::Result<()> {
        info!(mode = %self.session.manager().mode(), "Viewer started");
        let mut terminal_events = EventStream::new();
        let mut tick = interval(self.tick_rate);

        terminal.draw(|frame| self.render(frame))?;

        while self.running {
            let deadline = self.session.manager().throttle_deadline();
            let throttle = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending().await,
                }
            };
            let terminal_event = terminal_events.next();

            tokio::select! {
                Some(completion) = self.session.next_completion() => {
                    self.session.apply_completion(completion);
                }

                () = throttle => {
                    self.session.poll_throttle(Instant::now());
                    self.session.sync_observer();
                }

                Some(Ok(event)) = terminal_event => {
                    self.handle_terminal_event(event);
                }

                _ = tick.tick() => {
                    self.session.drain_completions();
                    self.session.drain_events();
                }
            }

            terminal.draw(|frame| self.render(frame))?;
        }

        info!(events = ?self.session.events(), "Viewer closed");
        Ok(())
    }

    fn handle_terminal_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Resize(width, height) => {
                debug!(width, height, "Terminal resized");
                self.session.resized(Instant::now());
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let Some(command) = map_key(&key) else {
            return;
        };

        let now = Instant::now();
        let page = self.session.viewport().height;
        match command {
            ViewerCommand::Quit => self.running = false,
            ViewerCommand::ScrollDown => self.scroll(self.scroll_step, now),
            ViewerCommand::ScrollUp => self.scroll(-self.scroll_step, now),
            ViewerCommand::PageDown => self.scroll(page, now),
            ViewerCommand::PageUp => self.scroll(-page, now),
            ViewerCommand::NextContainer => {
                let focus = self.session.next_focus();
                self.last_action = format!("focus {focus}");
            }
            ViewerCommand::ToggleMode => {
                let mode = self.session.toggle_mode();
                self.last_action = format!("mode {mode}");
            }
            ViewerCommand::RetryErrored => {
                let started = self.session.retry_errored();
                self.last_action = format!("retried {started}");
            }
            ViewerCommand::DetachVisible => {
                self.last_action = match self.session.detach_visible() {
                    Some(element) => format!("detached {element}"),
                    None => "nothing to detach".to_string(),
                };
            }
            ViewerCommand::ToggleGallery => self.show_gallery = !self.show_gallery,
            ViewerCommand::CycleGalleryFilter => {
                self.gallery_filter = std::mem::take(&mut self.gallery_filter).cycle_kind();
                self.show_gallery = true;
                self.last_action = format!("gallery {}", self.gallery_filter.label());
            }
        }
    }

    fn scroll(&mut self, dy: f64, now: Instant) {
        if self.session.scroll(dy, now) {
            let focus = self.session.focus();
            let offset = self.session.host().scroll_offset(focus);
            self.last_action = format!("{focus} @ {offset:.0}px");
        }
    }

    fn render(&self, frame: &mut Frame) {
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let manager = self.session.manager();
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(
                    format!(" {} ", self.title),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(
                        " {} mode  focus {}  {} in flight",
                        manager.mode(),
                        self.session.focus(),
                        manager.in_flight()
                    ),
                    Style::default().fg(Color::DarkGray),
                ),
            ])),
            header,
        );

        let boxes = self.session.element_boxes();
        let page = PageView::new(self.session.viewport(), &boxes).title(&self.title);
        if self.show_gallery {
            let [left, right] =
                Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)])
                    .areas(body);
            frame.render_widget(page, left);
            let summary =
                GallerySummary::collect_filtered(manager.elements(), &self.gallery_filter);
            frame.render_widget(GalleryPanel::new(&summary), right);
        } else {
            frame.render_widget(page, body);
        }

        let status = StatusBar::from_counts(self.session.counts())
            .center(self.last_action.as_str())
            .right(format!("cache {} ", manager.cache_stats()));
        frame.render_widget(&status, footer);
    }
}
