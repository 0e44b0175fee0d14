use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};

use crate::ui::Theme;

/// Status bar: an optional indicator, keyboard hints, and right-aligned text
pub struct StatusBar<'a> {
    indicator: Option<Span<'a>>,
    hints: Vec<(&'a str, &'a str)>,
    right_text: Option<String>,
    right_style: Style,
}

impl<'a> StatusBar<'a> {
    pub fn new() -> Self {
        Self {
            indicator: None,
            hints: Vec::new(),
            right_text: None,
            right_style: Theme::status_bar(),
        }
    }

    /// Leading badge, e.g. the live tail state
    pub fn indicator(mut self, indicator: Span<'a>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Add keyboard hints as (key, description) pairs
    pub fn hints<I>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.hints = hints.into_iter().collect();
        self
    }

    /// Set text to display on the right side
    pub fn right<S: Into<String>>(mut self, text: S) -> Self {
        self.right_text = Some(text.into());
        self
    }

    pub fn right_style(mut self, style: Style) -> Self {
        self.right_style = style;
        self
    }
}

impl Default for StatusBar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        buf.set_style(area, Theme::status_bar());

        let mut spans = Vec::new();
        if let Some(indicator) = self.indicator {
            spans.push(indicator);
            spans.push(Span::styled("  ", Theme::status_bar()));
        }
        for (i, (key, desc)) in self.hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("  ", Theme::status_bar()));
            }
            spans.push(Span::styled(format!("[{}]", key), Theme::status_bar_key()));
            spans.push(Span::styled(format!(" {}", desc), Theme::status_bar()));
        }

        let line = Line::from(spans);
        let line_width = line.width() as u16;

        // Render hints on the left
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));

        // Render right text if there is room for it
        if let Some(right) = self.right_text {
            let right_width = Line::raw(right.as_str()).width() as u16;
            let right_span = Span::styled(&right, self.right_style);
            let right_x = area.x + area.width.saturating_sub(right_width + 2);
            if right_x > area.x + line_width + 2 {
                buf.set_span(right_x, area.y, &right_span, right_width);
            }
        }
    }
}

/// Default hints for the log viewer
pub fn log_viewer_hints() -> Vec<(&'static str, &'static str)> {
    vec![
        ("/", "Search"),
        ("l", "Labels"),
        ("P", "Presets"),
        ("r", "Refresh"),
        ("?", "Help"),
        ("q", "Quit"),
    ]
}
