mod help_overlay;
mod label_panel;
mod preset_list;
mod status_bar;

pub use help_overlay::HelpOverlay;
pub use label_panel::LabelPanel;
pub use preset_list::PresetList;
pub use status_bar::{StatusBar, log_viewer_hints};
