use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout as RatatuiLayout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, StatefulWidget, Widget},
};

use lokiscope_logs::{LabelFilter, MergedLine};
use lokiscope_types::{LogStreamLabels, format_timestamp};

use crate::ui::Theme;

/// Side panel describing the highlighted line: when it was logged and the
/// labels of the stream it came from
pub struct LabelPanel<'a> {
    line: Option<MergedLine<'a>>,
    filter: &'a LabelFilter,
    selection: usize,
    local_time: bool,
}

impl<'a> LabelPanel<'a> {
    pub fn new(line: Option<MergedLine<'a>>, filter: &'a LabelFilter) -> Self {
        Self {
            line,
            filter,
            selection: 0,
            local_time: true,
        }
    }

    pub fn selection(mut self, selection: usize) -> Self {
        self.selection = selection;
        self
    }

    pub fn local_time(mut self, local: bool) -> Self {
        self.local_time = local;
        self
    }

    /// The label shown at `index`, in panel order
    pub fn label_at(labels: &LogStreamLabels, index: usize) -> Option<(&str, &str)> {
        labels
            .iter()
            .nth(index)
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl Widget for LabelPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border_focused())
            .title(Span::styled(" Log info ", Theme::title()));

        let Some(line) = self.line else {
            Paragraph::new(Span::styled("No line selected", Theme::text_dim()))
                .block(block)
                .render(area, buf);
            return;
        };

        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(1)])
            .split(inner);

        let header = vec![
            Line::from(vec![
                Span::styled("time  ", Theme::text_dim()),
                Span::styled(
                    format_timestamp(line.entry.timestamp, self.local_time),
                    Theme::text(),
                ),
            ]),
            Line::from(vec![
                Span::styled("level ", Theme::text_dim()),
                Span::styled(line.level.as_str(), Theme::severity_badge(line.level)),
            ]),
        ];
        Paragraph::new(header).render(chunks[0], buf);

        let items: Vec<ListItem> = line
            .source_labels
            .iter()
            .map(|(name, value)| {
                let active = self.filter.label(name) == Some(value.as_str());
                let (marker, style) = if active {
                    ("● ", Theme::list_item_current())
                } else {
                    ("  ", Theme::list_item())
                };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(name.clone(), Theme::text_dim()),
                    Span::styled(" = ", Theme::text_dim()),
                    Span::styled(value.clone(), style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Theme::border())
                    .title(Span::styled(" labels [Enter] add/remove ", Theme::text_dim())),
            )
            .highlight_style(Theme::list_item_selected());

        let mut state = ListState::default().with_selected(Some(self.selection));
        StatefulWidget::render(list, chunks[1], buf, &mut state);
    }
}
