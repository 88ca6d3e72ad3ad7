//! Terminal rendering.

mod progress;

pub use progress::{RunProgress, format_summary};
