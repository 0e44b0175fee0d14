use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::ui::Theme;

type Section = (&'static str, &'static [(&'static str, &'static str)]);

const SECTIONS: &[Section] = &[
    (
        "Feed",
        &[
            ("j/↓ k/↑", "Move selection (leaving the top pauses)"),
            ("^d ^u", "Page down / up"),
            ("g Home", "Return to top, resume live tail"),
            ("G End", "Oldest loaded line, pages further back"),
            ("wheel", "Scroll"),
            ("r", "Reload from scratch"),
        ],
    ),
    (
        "Display",
        &[
            ("t", "Timestamps"),
            ("T", "Local / UTC time"),
            ("p", "Stream names"),
            ("s", "Severity counts"),
        ],
    ),
    (
        "Filter",
        &[
            ("/", "Edit search regex"),
            ("n", "Clear search"),
            ("l Enter", "Labels of the selected line"),
            ("Enter", "Add / remove label (in panel)"),
            ("X", "Drop labels and search"),
            ("P", "Saved filters"),
        ],
    ),
    (
        "Other",
        &[
            ("y", "Show download link"),
            ("?", "Toggle this help"),
            ("Esc", "Close panel / dismiss notice"),
            ("q", "Quit"),
        ],
    ),
];

/// Help overlay showing keybindings
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn render(frame: &mut Frame) {
        let lines = Self::lines();
        let area = frame.area();

        let width = 56.min(area.width.saturating_sub(4));
        let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        );

        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Theme::border_focused())
                    .title(Span::styled(" Help ", Theme::title())),
            ),
            popup,
        );
    }

    fn lines() -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for (i, (title, keys)) in SECTIONS.iter().enumerate() {
            if i > 0 {
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(*title, Theme::text_highlight())));
            for (key, desc) in keys.iter() {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {:>8}", key), Style::default().fg(Theme::SUCCESS)),
                    Span::styled(format!("  {}", desc), Theme::text()),
                ]));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_section_listed() {
        let text: Vec<String> = HelpOverlay::lines()
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();

        for (title, keys) in SECTIONS {
            assert!(text.iter().any(|l| l.as_str() == *title));
            assert!(keys.iter().all(|(_, desc)| text.iter().any(|l| l.contains(desc))));
        }
    }
}
