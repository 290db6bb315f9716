//! Output formatting for phase results
//!
//! This module provides:
//! - Text output for human-readable display
//! - JSON output for machine processing
//! - Line diffs of rewritten manifests

mod diff;
mod json;
mod text;

pub use diff::line_diff;
pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::engine::{PlanResult, ScanResult, UpdateResult};
use crate::schedule::ScheduleStatus;
use std::io::Write;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for machine processing
    Json,
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Summary line only
    Quiet,
    /// Normal output
    #[default]
    Normal,
    /// Skipped dependencies and diffs as well
    Verbose,
}

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbosity: Verbosity,
    /// Whether to use colors (when supported)
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            verbosity: Verbosity::default(),
            color: true,
        }
    }
}

impl OutputConfig {
    pub fn new(format: OutputFormat, verbosity: Verbosity) -> Self {
        Self {
            format,
            verbosity,
            color: true,
        }
    }

    /// Create configuration from CLI arguments
    pub fn from_cli(json: bool, verbose: bool, quiet: bool) -> Self {
        let format = if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        };

        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };

        Self::new(format, verbosity)
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

/// Trait for output formatters, one method per command
pub trait OutputFormatter {
    /// Format the manifests found by a scan
    fn format_scan(&self, result: &ScanResult, writer: &mut dyn Write) -> std::io::Result<()>;

    /// Format the plans computed for the scanned manifests
    fn format_plan(&self, result: &PlanResult, writer: &mut dyn Write) -> std::io::Result<()>;

    /// Format an update run: the plans it worked from and what was applied
    fn format_update(
        &self,
        plans: &PlanResult,
        result: &UpdateResult,
        writer: &mut dyn Write,
    ) -> std::io::Result<()>;

    /// Format the schedule status
    fn format_schedule(
        &self,
        status: &ScheduleStatus,
        writer: &mut dyn Write,
    ) -> std::io::Result<()>;
}

/// Create an output formatter based on configuration
pub fn create_formatter(config: OutputConfig) -> Box<dyn OutputFormatter> {
    match config.format {
        OutputFormat::Text => Box::new(TextFormatter::with_color(config.verbosity, config.color)),
        OutputFormat::Json => Box::new(JsonFormatter::new(config.verbosity)),
    }
}
