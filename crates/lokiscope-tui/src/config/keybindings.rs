use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use std::collections::HashMap;

use crate::app::{Action, Focus};

/// Rows moved per mouse wheel notch
const WHEEL_STEP: usize = 3;

/// A key combination
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn shift(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::SHIFT,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

/// Context for keybindings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    LogViewer,
    FilterInput,
    LabelPanel,
    Presets,
}

impl From<Focus> for KeyContext {
    fn from(focus: Focus) -> Self {
        match focus {
            Focus::Logs => Self::LogViewer,
            Focus::Search => Self::FilterInput,
            Focus::LabelPanel => Self::LabelPanel,
            Focus::Presets => Self::Presets,
        }
    }
}

/// Keybinding configuration
pub struct KeyBindings {
    bindings: HashMap<KeyContext, HashMap<KeyBinding, Action>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();

        // Global bindings
        let mut global = HashMap::new();
        global.insert(KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::new(KeyCode::Esc), Action::Dismiss);
        global.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit);
        global.insert(KeyBinding::new(KeyCode::Char('q')), Action::Quit);
        bindings.insert(KeyContext::Global, global);

        // Log viewer bindings - less-like navigation
        let mut log_viewer = HashMap::new();
        // Line navigation
        log_viewer.insert(KeyBinding::new(KeyCode::Char('j')), Action::ScrollDown(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Down), Action::ScrollDown(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Char('k')), Action::ScrollUp(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Up), Action::ScrollUp(1));
        // Page navigation (less-style)
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('f')), Action::PageDown);
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('b')), Action::PageUp);
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('d')), Action::PageDown);
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::PageUp);
        log_viewer.insert(KeyBinding::new(KeyCode::PageDown), Action::PageDown);
        log_viewer.insert(KeyBinding::new(KeyCode::PageUp), Action::PageUp);
        // Top resumes the live tail; bottom pages in older lines
        log_viewer.insert(KeyBinding::new(KeyCode::Char('g')), Action::ReturnToTop);
        log_viewer.insert(KeyBinding::new(KeyCode::Home), Action::ReturnToTop);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('<')), Action::ReturnToTop);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('G')), Action::ScrollToBottom);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('>')), Action::ScrollToBottom);
        log_viewer.insert(KeyBinding::new(KeyCode::End), Action::ScrollToBottom);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('r')), Action::Refresh);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('t')), Action::ToggleTimestamps);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('T')), Action::ToggleLocalTime);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('p')), Action::ToggleStreamNames);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('s')), Action::ToggleStats);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('/')), Action::OpenSearch);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('n')), Action::ClearSearch);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('l')), Action::ToggleLabelPanel);
        log_viewer.insert(KeyBinding::new(KeyCode::Enter), Action::ToggleLabelPanel);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('X')), Action::ClearLabels);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('P')), Action::TogglePresets);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('y')), Action::ShowDownloadUrl);
        bindings.insert(KeyContext::LogViewer, log_viewer);

        // Label panel bindings; unbound keys fall through to the log viewer
        let mut label_panel = HashMap::new();
        label_panel.insert(KeyBinding::new(KeyCode::Char('j')), Action::LabelDown);
        label_panel.insert(KeyBinding::new(KeyCode::Down), Action::LabelDown);
        label_panel.insert(KeyBinding::new(KeyCode::Char('k')), Action::LabelUp);
        label_panel.insert(KeyBinding::new(KeyCode::Up), Action::LabelUp);
        label_panel.insert(KeyBinding::new(KeyCode::Enter), Action::LabelToggle);
        label_panel.insert(KeyBinding::new(KeyCode::Char('l')), Action::ToggleLabelPanel);
        label_panel.insert(KeyBinding::new(KeyCode::Tab), Action::ToggleLabelPanel);
        bindings.insert(KeyContext::LabelPanel, label_panel);

        // Saved filter list
        let mut presets = HashMap::new();
        presets.insert(KeyBinding::new(KeyCode::Char('j')), Action::PresetDown);
        presets.insert(KeyBinding::new(KeyCode::Down), Action::PresetDown);
        presets.insert(KeyBinding::new(KeyCode::Char('k')), Action::PresetUp);
        presets.insert(KeyBinding::new(KeyCode::Up), Action::PresetUp);
        presets.insert(KeyBinding::new(KeyCode::Enter), Action::PresetSelect);
        presets.insert(KeyBinding::shift(KeyCode::Char('P')), Action::TogglePresets);
        bindings.insert(KeyContext::Presets, presets);

        // Filter input bindings (when search bar is active)
        let mut filter_input = HashMap::new();
        filter_input.insert(KeyBinding::new(KeyCode::Enter), Action::ApplySearch);
        filter_input.insert(KeyBinding::new(KeyCode::Esc), Action::CloseSearch);
        filter_input.insert(KeyBinding::new(KeyCode::Backspace), Action::SearchBackspace);
        filter_input.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::SearchClear);
        filter_input.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::CloseSearch);
        bindings.insert(KeyContext::FilterInput, filter_input);

        Self { bindings }
    }

    fn lookup(&self, context: KeyContext, binding: &KeyBinding) -> Option<Action> {
        self.bindings.get(&context)?.get(binding).cloned()
    }

    /// Look up action for key event in given context
    pub fn get_action(&self, context: KeyContext, key: &KeyEvent) -> Option<Action> {
        if context == KeyContext::FilterInput {
            return self.get_filter_input_action(key);
        }

        let binding = KeyBinding::from_event(key);

        // First check context-specific bindings
        if let Some(action) = self.lookup(context, &binding) {
            return Some(action);
        }

        // The label panel sits next to the log list and keeps its scrolling keys
        if context == KeyContext::LabelPanel
            && let Some(action) = self.lookup(KeyContext::LogViewer, &binding)
        {
            return Some(action);
        }

        // Fall back to global bindings
        self.lookup(KeyContext::Global, &binding)
    }

    /// Handle key event in filter input mode
    /// Returns Some(Action) for special keys, None for regular character input
    pub fn get_filter_input_action(&self, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        // Check filter input bindings first
        if let Some(action) = self.lookup(KeyContext::FilterInput, &binding) {
            return Some(action);
        }

        // For regular characters, return SearchInput action
        if let KeyCode::Char(c) = key.code
            && (key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT)
        {
            return Some(Action::SearchInput(c));
        }

        None
    }

    /// Mouse wheel scrolls the log list
    pub fn get_mouse_action(&self, mouse: &MouseEvent) -> Option<Action> {
        match mouse.kind {
            MouseEventKind::ScrollDown => Some(Action::ScrollDown(WHEEL_STEP)),
            MouseEventKind::ScrollUp => Some(Action::ScrollUp(WHEEL_STEP)),
            _ => None,
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}
