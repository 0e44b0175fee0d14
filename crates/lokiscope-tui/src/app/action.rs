/// All possible actions in the application (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,

    // UI toggles
    ToggleHelp,
    /// Close the top-most overlay, or dismiss the current notice
    Dismiss,

    // Log viewer navigation
    ScrollUp(usize),
    ScrollDown(usize),
    PageUp,
    PageDown,
    ScrollToBottom,
    /// Jump to the newest line and resume the live tail
    ReturnToTop,
    Refresh,

    // Display
    ToggleTimestamps,
    ToggleLocalTime,
    ToggleStreamNames,
    ToggleStats,

    // Search clause of the query
    OpenSearch,
    CloseSearch,
    SearchInput(char),
    SearchBackspace,
    SearchClear,
    ApplySearch,
    ClearSearch,

    // Label panel
    ToggleLabelPanel,
    LabelUp,
    LabelDown,
    /// Add the highlighted label to the filter, or remove it if already active
    LabelToggle,
    ClearLabels,

    // Saved filters
    TogglePresets,
    PresetUp,
    PresetDown,
    PresetSelect,

    ShowDownloadUrl,

    // Notices
    ShowNotice(String),

    // Render request
    Render,
}
