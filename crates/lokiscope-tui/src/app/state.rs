use ratatui::widgets::ListState;

use lokiscope_logs::{SavedFilter, Viewport};

/// Which part of the screen receives keys
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Logs,
    Search,
    LabelPanel,
    Presets,
}

/// UI-specific transient state
pub struct UiState {
    /// Is search input active?
    pub search_active: bool,

    /// Current search input text
    pub search_input: String,

    /// Is help overlay visible?
    pub help_visible: bool,

    /// First visible row; row 0 is the newest line
    pub log_scroll: usize,

    /// Highlighted row (absolute)
    pub selected: usize,

    /// Visible rows in the log area, updated on every render
    pub page_height: usize,

    /// Show timestamps in log viewer?
    pub show_timestamps: bool,

    /// Show timestamps in local time (vs UTC)
    pub use_local_time: bool,

    /// Show stream names in log viewer?
    pub show_stream_names: bool,

    /// Show severity counts?
    pub stats_visible: bool,

    /// Label panel for the highlighted line
    pub label_panel_visible: bool,

    /// Highlighted label in the panel
    pub label_selection: usize,

    /// Saved filter list
    pub presets_visible: bool,

    pub preset_state: ListState,

    /// Search input error (e.g. invalid regex)
    pub filter_error: Option<String>,

    /// One-off message for the status line (download link etc.)
    pub notice: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            search_active: false,
            search_input: String::new(),
            help_visible: false,
            log_scroll: 0,
            selected: 0,
            page_height: 20,
            show_timestamps: true,
            use_local_time: true,
            show_stream_names: true,
            stats_visible: false,
            label_panel_visible: false,
            label_selection: 0,
            presets_visible: false,
            preset_state: ListState::default(),
            filter_error: None,
            notice: None,
        }
    }
}

/// Global application state
pub struct AppState {
    /// Backend base URL, shown in the header
    pub endpoint: String,

    /// Saved filters from the config file
    pub presets: Vec<SavedFilter>,

    /// UI state
    pub ui_state: UiState,

    /// Whether app should quit
    pub should_quit: bool,
}

impl AppState {
    pub fn new(endpoint: impl Into<String>, presets: Vec<SavedFilter>) -> Self {
        let mut ui_state = UiState::default();
        if !presets.is_empty() {
            ui_state.preset_state.select(Some(0));
        }

        Self {
            endpoint: endpoint.into(),
            presets,
            ui_state,
            should_quit: false,
        }
    }

    pub fn focus(&self) -> Focus {
        if self.ui_state.presets_visible {
            Focus::Presets
        } else if self.ui_state.search_active {
            Focus::Search
        } else if self.ui_state.label_panel_visible {
            Focus::LabelPanel
        } else {
            Focus::Logs
        }
    }

    /// Current scroll position for pagination and tail decisions
    pub fn viewport(&self, total: usize) -> Viewport {
        Viewport::new(self.ui_state.log_scroll, self.ui_state.page_height, total)
            .with_selected(self.ui_state.selected)
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.ui_state.selected = self.ui_state.selected.saturating_sub(n);
        self.follow_selection();
    }

    pub fn scroll_down(&mut self, n: usize, total: usize) {
        let last = total.saturating_sub(1);
        self.ui_state.selected = self.ui_state.selected.saturating_add(n).min(last);
        self.follow_selection();
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.ui_state.page_height.max(1));
    }

    pub fn page_down(&mut self, total: usize) {
        self.scroll_down(self.ui_state.page_height.max(1), total);
    }

    pub fn scroll_to_bottom(&mut self, total: usize) {
        self.scroll_down(usize::MAX, total);
    }

    /// Back to the newest line
    pub fn jump_to_top(&mut self) {
        self.ui_state.selected = 0;
        self.ui_state.log_scroll = 0;
        self.ui_state.label_selection = 0;
    }

    /// Keep the highlighted row inside the visible window
    fn follow_selection(&mut self) {
        let ui = &mut self.ui_state;
        let height = ui.page_height.max(1);
        if ui.selected < ui.log_scroll {
            ui.log_scroll = ui.selected;
        } else if ui.selected >= ui.log_scroll + height {
            ui.log_scroll = ui.selected + 1 - height;
        }
        ui.label_selection = 0;
    }

    /// Fit scroll state to the current row count and page height
    pub fn clamp_scroll(&mut self, total: usize, page_height: usize) {
        let ui = &mut self.ui_state;
        ui.page_height = page_height;
        ui.selected = ui.selected.min(total.saturating_sub(1));
        ui.log_scroll = ui.log_scroll.min(total.saturating_sub(page_height));
        self.follow_selection_keep_label();
    }

    fn follow_selection_keep_label(&mut self) {
        let label = self.ui_state.label_selection;
        self.follow_selection();
        self.ui_state.label_selection = label;
    }

    pub fn label_up(&mut self) {
        self.ui_state.label_selection = self.ui_state.label_selection.saturating_sub(1);
    }

    pub fn label_down(&mut self, count: usize) {
        if self.ui_state.label_selection + 1 < count {
            self.ui_state.label_selection += 1;
        }
    }

    /// Move preset selection up (wraps)
    pub fn preset_up(&mut self) {
        let len = self.presets.len();
        if len == 0 {
            return;
        }
        let i = match self.ui_state.preset_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.ui_state.preset_state.select(Some(i));
    }

    /// Move preset selection down (wraps)
    pub fn preset_down(&mut self) {
        let len = self.presets.len();
        if len == 0 {
            return;
        }
        let i = match self.ui_state.preset_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.ui_state.preset_state.select(Some(i));
    }

    pub fn selected_preset(&self) -> Option<&SavedFilter> {
        self.presets.get(self.ui_state.preset_state.selected()?)
    }

    /// Start search input, seeded with the active search
    pub fn start_search(&mut self, current: &str) {
        self.ui_state.search_active = true;
        self.ui_state.search_input = current.to_string();
        self.ui_state.filter_error = None;
    }

    pub fn cancel_search(&mut self) {
        self.ui_state.search_active = false;
        self.ui_state.search_input.clear();
        self.ui_state.filter_error = None;
    }

    pub fn search_input_char(&mut self, c: char) {
        self.ui_state.search_input.push(c);
    }

    pub fn search_input_backspace(&mut self) {
        self.ui_state.search_input.pop();
    }

    pub fn show_notice(&mut self, msg: impl Into<String>) {
        self.ui_state.notice = Some(msg.into());
    }

    /// Close the top-most overlay. Returns false if there was none, in which
    /// case the notice is cleared instead.
    pub fn dismiss(&mut self) -> bool {
        let ui = &mut self.ui_state;
        if ui.help_visible {
            ui.help_visible = false;
        } else if ui.presets_visible {
            ui.presets_visible = false;
        } else if ui.label_panel_visible {
            ui.label_panel_visible = false;
        } else {
            ui.notice = None;
            return false;
        }
        true
    }
}
