use ratatui::{
    Frame,
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, List, ListItem, ListState, Paragraph, StatefulWidget, Widget,
    },
};

use lokiscope_logs::{LabelFilter, SavedFilter};

use crate::ui::{Layout, Theme};

/// Saved filter list; the presets matching the active filter are marked
pub struct PresetList<'a> {
    items: Vec<ListItem<'a>>,
    title: &'a str,
    highlight_symbol: &'a str,
}

impl<'a> PresetList<'a> {
    pub fn new(presets: &'a [SavedFilter], filter: &LabelFilter) -> Self {
        let items = presets
            .iter()
            .map(|preset| {
                let current = preset.is_selected(filter);
                let style = if current {
                    Theme::list_item_current()
                } else {
                    Theme::list_item()
                };

                let mut spans = vec![Span::styled(preset.name.as_str(), style)];
                if current {
                    spans.push(Span::styled(" (active)", style));
                }
                if !preset.description.is_empty() {
                    spans.push(Span::styled(
                        format!("  {}", preset.description),
                        Theme::text_dim(),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        Self {
            items,
            title: " Saved filters [Enter] toggle ",
            highlight_symbol: "▶ ",
        }
    }

    /// Render as a centered popup
    pub fn render_popup(self, frame: &mut Frame, state: &mut ListState) {
        let area = Layout::centered_popup(frame.area(), 60, 50);
        frame.render_widget(Clear, area);
        frame.render_stateful_widget(self, area, state);
    }
}

impl StatefulWidget for PresetList<'_> {
    type State = ListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border_focused())
            .title(Span::styled(self.title, Theme::title()));

        if self.items.is_empty() {
            let empty = Paragraph::new(Span::styled(
                "No saved filters. Add [[presets]] to the config file.",
                Theme::text_dim(),
            ))
            .block(block);
            Widget::render(empty, area, buf);
            return;
        }

        let list = List::new(self.items)
            .block(block)
            .highlight_style(Theme::list_item_selected())
            .highlight_symbol(self.highlight_symbol);

        StatefulWidget::render(list, area, buf, state);
    }
}
