//! Screen implementations

mod log_viewer;

pub use log_viewer::LogViewerScreen;
