//! Terminal and JSON output

mod formatter;

pub use formatter::Formatter;

/// Output options shared by every command
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Emit JSON instead of human-readable text
    pub json: bool,
    /// Disable colors
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
