pub mod components;
mod layout;
pub mod screens;
mod theme;

pub use layout::Layout;
pub use theme::{Theme, stream_color};
