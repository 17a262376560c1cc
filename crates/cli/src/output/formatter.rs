//! Output formatter for human-readable and JSON output
//!
//! Every line stashcp prints goes through [`Formatter`], so `--json`,
//! `--quiet` and `--no-color` behave the same everywhere.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use console::Style;
use sc_core::RecordedError;
use serde::Serialize;

use super::OutputConfig;

/// Color theme for styled output
#[derive(Debug, Clone)]
pub struct Theme {
    /// Local paths and federation locators - cyan
    pub path: Style,
    /// Transfer sizes - green
    pub size: Style,
    /// Method names - bold
    pub method: Style,
    /// Durations and timestamps - dim
    pub time: Style,
    pub success: Style,
    pub error: Style,
    pub warning: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            path: Style::new().cyan(),
            size: Style::new().green(),
            method: Style::new().bold(),
            time: Style::new().dim(),
            success: Style::new().green(),
            error: Style::new().red(),
            warning: Style::new().yellow(),
        }
    }
}

impl Theme {
    /// Returns a theme with no styling (for no-color mode)
    pub fn plain() -> Self {
        Self {
            path: Style::new(),
            size: Style::new(),
            method: Style::new(),
            time: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warning: Style::new(),
        }
    }
}

/// Formatter for CLI output
///
/// When JSON mode is enabled all output is strict JSON without colors or
/// progress.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    theme: Theme,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let theme = if config.no_color || config.json {
            Theme::plain()
        } else {
            Theme::default()
        };
        Self { config, theme }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Whether a progress spinner may be drawn
    pub fn show_progress(&self) -> bool {
        !self.config.quiet && !self.config.json
    }

    pub fn style_path(&self, text: &str) -> String {
        self.theme.path.apply_to(text).to_string()
    }

    pub fn style_size(&self, text: &str) -> String {
        self.theme.size.apply_to(text).to_string()
    }

    pub fn style_method(&self, text: &str) -> String {
        self.theme.method.apply_to(text).to_string()
    }

    pub fn style_time(&self, text: &str) -> String {
        self.theme.time.apply_to(text).to_string()
    }

    /// Output a success message
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        let checkmark = self.theme.success.apply_to("✓");
        println!("{checkmark} {message}");
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({ "error": message });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else {
            let cross = self.theme.error.apply_to("✗");
            eprintln!("{cross} {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        let warn_icon = self.theme.warning.apply_to("⚠");
        eprintln!("{warn_icon} {message}");
    }

    /// Output JSON directly
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Render recorded faults as a table for the final report
    pub fn error_table(&self, errors: &[RecordedError]) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Elapsed", "Error"]);
        if !self.colors_enabled() {
            table.force_no_tty();
        }

        for error in errors {
            table.add_row(vec![
                format!("{:.2}s", error.elapsed.as_secs_f64()),
                error.message.clone(),
            ]);
        }
        table.to_string()
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}
