use chrono::{DateTime, Local};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout as RatatuiLayout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use regex::Regex;
use unicode_width::UnicodeWidthChar;

use lokiscope_logs::{FetchKind, LogSession, MergedLine, NAMESPACE_LABEL};
use lokiscope_types::Severity;

use crate::app::AppState;
use crate::ui::components::{LabelPanel, StatusBar, log_viewer_hints};
use crate::ui::{Layout, Theme, stream_color};

/// Width of the stream name column
const STREAM_WIDTH: usize = 14;

/// Log viewer screen
pub struct LogViewerScreen;

/// Cut `text` to at most `max_width` terminal columns, marking the cut with an
/// ellipsis. Control characters become spaces so a line stays on one row.
fn fit_width(text: &str, max_width: usize) -> String {
    let clean = |c: char| if c.is_control() { ' ' } else { c };
    let width: usize = text.chars().map(|c| clean(c).width().unwrap_or(0)).sum();
    if width <= max_width {
        return text.chars().map(clean).collect();
    }

    let budget = max_width.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars().map(clean) {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

/// Split `text` into spans, highlighting every match of `search`
fn highlight<'a>(text: String, search: Option<&Regex>, base: Style) -> Vec<Span<'a>> {
    let Some(re) = search else {
        return vec![Span::styled(text, base)];
    };

    let mut spans = Vec::new();
    let mut last_end = 0;
    for m in re.find_iter(&text) {
        if m.start() == m.end() {
            continue;
        }
        if m.start() > last_end {
            spans.push(Span::styled(text[last_end..m.start()].to_string(), base));
        }
        spans.push(Span::styled(m.as_str().to_string(), Theme::search_match()));
        last_end = m.end();
    }
    if last_end == 0 {
        return vec![Span::styled(text, base)];
    }
    if last_end < text.len() {
        spans.push(Span::styled(text[last_end..].to_string(), base));
    }
    spans
}

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState, session: &LogSession) {
        let area = frame.area();

        let show_search_bar = state.ui_state.search_active
            || session.filter().has_search()
            || state.ui_state.filter_error.is_some();
        let show_notice = session.error().is_some() || state.ui_state.notice.is_some();

        // Build constraints based on what's visible
        let mut constraints = vec![Constraint::Length(3), Constraint::Length(1)]; // Header, labels
        if show_search_bar {
            constraints.push(Constraint::Length(3));
        }
        if state.ui_state.stats_visible {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(1)); // Logs
        if show_notice {
            constraints.push(Constraint::Length(1));
        }
        constraints.push(Constraint::Length(1)); // Status bar

        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let mut idx = 0;

        Self::render_header(frame, chunks[idx], state, session);
        idx += 1;
        Self::render_labels_bar(frame, chunks[idx], session);
        idx += 1;

        if show_search_bar {
            Self::render_search_bar(frame, chunks[idx], state, session);
            idx += 1;
        }

        if state.ui_state.stats_visible {
            Self::render_stats_bar(frame, chunks[idx], session);
            idx += 1;
        }

        // Logs, with the label panel beside them
        let (logs_area, panel_area) =
            Layout::log_viewer(chunks[idx], state.ui_state.label_panel_visible);
        idx += 1;
        Self::render_logs(frame, logs_area, state, session);
        if let Some(panel_area) = panel_area {
            let line = session.lines().nth(state.ui_state.selected);
            let panel = LabelPanel::new(line, session.filter())
                .selection(state.ui_state.label_selection)
                .local_time(state.ui_state.use_local_time);
            frame.render_widget(panel, panel_area);
        }

        if show_notice {
            Self::render_notice(frame, chunks[idx], state, session);
            idx += 1;
        }

        Self::render_status_bar(frame, chunks[idx], state, session);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState, session: &LogSession) {
        let streams = session.store().stream_count();

        let title = Line::from(vec![
            Span::styled("lokiscope", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(state.endpoint.as_str(), Theme::text()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(session.filter().namespace(), Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("{} stream{}", streams, if streams == 1 { "" } else { "s" }),
                Theme::text(),
            ),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(session.query(), Theme::text_dim()),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_labels_bar(frame: &mut Frame, area: Rect, session: &LogSession) {
        let filter = session.filter();
        let mut spans = vec![
            Span::styled(" Labels: ", Theme::text_dim()),
            Span::styled(
                format!("{}={}", NAMESPACE_LABEL, filter.namespace()),
                Theme::list_item_current(),
            ),
        ];
        for (name, value) in filter.labels() {
            spans.push(Span::styled("  ", Theme::text()));
            spans.push(Span::styled(
                format!("{}={}", name, value),
                Style::default().fg(stream_color(value)),
            ));
        }
        if !filter.labels().is_empty() {
            spans.push(Span::styled("  [X] clear", Theme::text_dim()));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_search_bar(frame: &mut Frame, area: Rect, state: &AppState, session: &LogSession) {
        let mut spans = vec![];

        // Prompt
        if state.ui_state.search_active {
            spans.push(Span::styled(
                " /",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(" Search: ", Theme::text_dim()));
        }

        // Input or current search
        let pattern = if state.ui_state.search_active {
            state.ui_state.search_input.as_str()
        } else {
            session.filter().search()
        };
        spans.push(Span::styled(pattern.to_string(), Theme::text_highlight()));

        // Cursor when active
        if state.ui_state.search_active {
            spans.push(Span::styled(
                "█",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        // Error message
        if let Some(err) = &state.ui_state.filter_error {
            spans.push(Span::styled(" ", Theme::text()));
            spans.push(Span::styled(format!("⚠ {}", err), Theme::error()));
        }

        // Hints
        if state.ui_state.search_active {
            spans.push(Span::styled(
                "  [Enter] Apply  [Esc] Cancel",
                Theme::text_dim(),
            ));
        } else {
            spans.push(Span::styled("  [n] Clear  [/] Edit", Theme::text_dim()));
        }

        let search_bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if state.ui_state.search_active {
                    Style::default().fg(Color::Yellow)
                } else if state.ui_state.filter_error.is_some() {
                    Style::default().fg(Color::Red)
                } else {
                    Theme::border()
                })
                .title(Span::styled(" Search (regex, case-insensitive) ", Theme::title())),
        );

        frame.render_widget(search_bar, area);
    }

    fn render_stats_bar(frame: &mut Frame, area: Rect, session: &LogSession) {
        let counts = session.level_counts();

        let mut spans = vec![Span::styled(" ", Theme::text())];
        for (level, count) in [
            (Severity::Fatal, counts.fatal),
            (Severity::Error, counts.error),
            (Severity::Warn, counts.warn),
            (Severity::Info, counts.info),
            (Severity::Other, counts.other),
        ] {
            spans.push(Span::styled(
                format!("{}:", level.as_str()),
                Theme::severity_badge(level),
            ));
            spans.push(Span::styled(format!("{} ", count), Theme::text()));
        }

        spans.push(Span::styled("│ ", Theme::text_dim()));
        spans.push(Span::styled("Total:", Theme::text_dim()));
        spans.push(Span::styled(format!("{}", counts.total()), Theme::text()));

        let stats_widget = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(" Stats ", Theme::title())),
        );

        frame.render_widget(stats_widget, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState, session: &LogSession) {
        let total = session.len();

        // Visible area (accounting for border)
        let inner_height = area.height.saturating_sub(2) as usize;
        state.clamp_scroll(total, inner_height);

        // Message width: borders and scrollbar
        let inner_width = area.width.saturating_sub(4) as usize;
        // Invalid patterns are rejected before they reach the query
        let search = session.filter().search_regex().ok().flatten();

        let offset = state.ui_state.log_scroll;
        let lines: Vec<Line> = session
            .lines()
            .skip(offset)
            .take(inner_height)
            .enumerate()
            .map(|(i, line)| {
                let mut rendered = Self::format_line(line, state, search.as_ref(), inner_width);
                if offset + i == state.ui_state.selected {
                    rendered = rendered.patch_style(Theme::row_selected());
                }
                rendered
            })
            .collect();

        let mut title = format!(" Logs ({}) ", total);
        match session.in_flight() {
            Some(FetchKind::Initial) => title.push_str("· loading… "),
            Some(FetchKind::Older) => title.push_str("· loading older… "),
            _ if session.is_exhausted() && total > 0 => title.push_str("· start of history "),
            _ => {}
        }

        let logs_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(logs_widget, area);

        if total > inner_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));

            let max_scroll = total.saturating_sub(inner_height);
            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(offset.min(max_scroll));

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    /// Format one merged line: time, stream, severity, text
    fn format_line(
        line: MergedLine<'_>,
        state: &AppState,
        search: Option<&Regex>,
        available_width: usize,
    ) -> Line<'static> {
        let mut spans = Vec::new();
        let mut prefix_width: usize = 0;

        // " HH:MM:SS.mmm" = 13 chars
        if state.ui_state.show_timestamps {
            let ts = line.entry.datetime();
            let time_str = if state.ui_state.use_local_time {
                ts.with_timezone(&Local).format("%H:%M:%S%.3f").to_string()
            } else {
                ts.format("%H:%M:%S%.3f").to_string()
            };
            spans.push(Span::styled(format!(" {}", time_str), Theme::text_dim()));
            prefix_width += 13;
        }

        if state.ui_state.show_stream_names {
            let name = line.source_labels.short_name();
            spans.push(Span::styled(
                format!(" {:>width$}", fit_width(&name, STREAM_WIDTH), width = STREAM_WIDTH),
                Style::default().fg(stream_color(&name)),
            ));
            prefix_width += STREAM_WIDTH + 1;
        }

        // " XXX" = 4 chars
        spans.push(Span::styled(
            format!(" {:>3}", line.level.as_str()),
            Theme::severity_badge(line.level),
        ));
        prefix_width += 4;

        // " │ " = 3 chars
        spans.push(Span::styled(" │ ", Theme::text_dim()));
        prefix_width += 3;

        let message_width = available_width.saturating_sub(prefix_width);
        let message = fit_width(&line.entry.text, message_width);
        spans.extend(highlight(message, search, Theme::severity_text(line.level)));

        Line::from(spans)
    }

    fn render_notice(frame: &mut Frame, area: Rect, state: &AppState, session: &LogSession) {
        let line = if let Some(err) = session.error() {
            Line::from(vec![
                Span::styled(format!(" ⚠ {}", err), Theme::error()),
                Span::styled("  [Esc] dismiss  [r] retry", Theme::text_dim()),
            ])
        } else if let Some(notice) = &state.ui_state.notice {
            Line::from(vec![
                Span::styled(format!(" {}", notice), Theme::text_highlight()),
                Span::styled("  [Esc] dismiss", Theme::text_dim()),
            ])
        } else {
            Line::default()
        };

        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, session: &LogSession) {
        let indicator = if session.is_live() {
            Span::styled("● Live", Theme::live())
        } else {
            Span::styled("▲ return to top [g]", Theme::paused())
        };

        let total = session.len();
        let position = if total == 0 {
            "no lines".to_string()
        } else {
            format!("{}/{}", state.ui_state.selected + 1, total)
        };
        let right = match session.cursor() {
            Some(ts) if state.ui_state.use_local_time => format!(
                "{} · oldest {}",
                position,
                DateTime::from_timestamp_nanos(ts)
                    .with_timezone(&Local)
                    .format("%H:%M:%S")
            ),
            Some(ts) => format!(
                "{} · oldest {}",
                position,
                DateTime::from_timestamp_nanos(ts).format("%H:%M:%S")
            ),
            None => position,
        };

        let status = StatusBar::new()
            .indicator(indicator)
            .hints(log_viewer_hints())
            .right(right);

        frame.render_widget(status, area);
    }
}
