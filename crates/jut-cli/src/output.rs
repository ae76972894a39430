//! Output formatting for CLI commands.
//!
//! Listings support table (human-readable) and JSON output. Streamed
//! points are rendered by a [`PointFormatter`] chosen from
//! [`PointFormat`]; diagnostics always go to stderr.

use std::collections::BTreeSet;
use std::io::Write;

use jut_proto::{JobSummary, Point, StreamEvent};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::cli::{Format, PointFormat};
use crate::config::Configuration;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write + ?Sized,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Running jobs for display.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct JobTable {
    /// Jobs to show.
    pub jobs: Vec<JobSummary>,
}

impl JobTable {
    const HEADERS: [&'static str; 5] = ["Job ID", "Juttle Name", "Owner", "Start Date", "Persistent"];

    fn rows(&self) -> Vec<[String; 5]> {
        self.jobs
            .iter()
            .map(|job| {
                [
                    job.id.clone(),
                    job.alias.clone().unwrap_or_default(),
                    job.user.clone().unwrap_or_default(),
                    job.start_time.clone().unwrap_or_default(),
                    if job.is_persistent() { "YES" } else { "NO" }.to_string(),
                ]
            })
            .collect()
    }
}

impl TableDisplay for JobTable {
    fn write_table<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), CliError> {
        let rows = self.rows();
        let mut widths = Self::HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let line = |cells: &[&str]| {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!(" {cell:<width$} "))
                .collect();
            format!("|{}|", padded.join("|"))
        };

        writeln!(writer, "{}", line(&Self::HEADERS))?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
        writeln!(writer, "|{}|", rule.join("+"))?;
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            writeln!(writer, "{}", line(&cells))?;
        }
        Ok(())
    }
}

/// Stored configurations for display.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigList {
    /// Configurations in store order.
    pub configurations: Vec<ConfigEntry>,
}

/// One configuration without its secret.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigEntry {
    /// `username@app_url`.
    pub name: String,
    /// Account username.
    pub username: String,
    /// Environment app URL.
    pub app_url: String,
    /// Default deployment.
    pub deployment_name: String,
    /// Whether this is the default configuration.
    pub default: bool,
    #[serde(skip)]
    label: String,
}

impl From<&Configuration> for ConfigEntry {
    fn from(c: &Configuration) -> Self {
        Self {
            name: c.name.clone(),
            username: c.username.clone(),
            app_url: c.app_url.clone(),
            deployment_name: c.deployment_name.clone(),
            default: c.default,
            label: c.label().to_string(),
        }
    }
}

impl TableDisplay for ConfigList {
    fn write_table<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.configurations.is_empty() {
            writeln!(writer, "No configurations available, please run `jut config add`")?;
            return Ok(());
        }

        writeln!(writer, "Current jut configurations:")?;
        for (i, entry) in self.configurations.iter().enumerate() {
            let marker = if entry.default { " (default)" } else { "" };
            writeln!(writer, " {}: {}{marker}", i + 1, entry.label)?;
        }
        Ok(())
    }
}

/// Simple message output.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.message)?;
        Ok(())
    }
}

/// Renders streamed points.
pub trait PointFormatter {
    /// Called once before any point.
    fn start(&mut self, _writer: &mut dyn Write) -> Result<(), CliError> {
        Ok(())
    }

    /// Render one point.
    fn point(&mut self, writer: &mut dyn Write, point: &Point) -> Result<(), CliError>;

    /// Called once after the last point.
    fn stop(&mut self, _writer: &mut dyn Write) -> Result<(), CliError> {
        Ok(())
    }
}

/// Build the formatter for `format`.
#[must_use]
pub fn point_formatter(format: PointFormat, persist: bool) -> Box<dyn PointFormatter> {
    match format {
        PointFormat::Json => Box::new(JsonPoints::new(persist)),
        PointFormat::Text => Box::new(TextPoints),
        PointFormat::Csv => Box::new(CsvPoints::default()),
    }
}

/// Pretty-printed points inside a JSON array. The brackets are left out in
/// persist mode, where the output never ends.
#[derive(Debug, Default)]
pub struct JsonPoints {
    persist: bool,
    wrote_point: bool,
}

impl JsonPoints {
    /// Create a JSON formatter.
    #[must_use]
    pub const fn new(persist: bool) -> Self {
        Self {
            persist,
            wrote_point: false,
        }
    }
}

impl PointFormatter for JsonPoints {
    fn start(&mut self, writer: &mut dyn Write) -> Result<(), CliError> {
        if !self.persist {
            writeln!(writer, "[")?;
        }
        Ok(())
    }

    fn point(&mut self, writer: &mut dyn Write, point: &Point) -> Result<(), CliError> {
        if self.wrote_point {
            writeln!(writer, ",")?;
        }
        let mut ser =
            serde_json::Serializer::with_formatter(&mut *writer, PrettyFormatter::with_indent(b"    "));
        point
            .serialize(&mut ser)
            .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
        writeln!(writer)?;
        self.wrote_point = true;
        Ok(())
    }

    fn stop(&mut self, writer: &mut dyn Write) -> Result<(), CliError> {
        if !self.persist {
            writeln!(writer, "]")?;
        }
        Ok(())
    }
}

/// `time` first, then the remaining values in key order.
#[derive(Debug, Default)]
pub struct TextPoints;

impl PointFormatter for TextPoints {
    fn point(&mut self, writer: &mut dyn Write, point: &Point) -> Result<(), CliError> {
        let values: Vec<String> = ordered_keys(point)
            .iter()
            .map(|key| plain(&point[*key]))
            .collect();
        writeln!(writer, "{}", values.join(" "))?;
        Ok(())
    }
}

/// Comma-separated values with a `#` header whenever the field set changes.
#[derive(Debug, Default)]
pub struct CsvPoints {
    headers: Vec<String>,
}

impl PointFormatter for CsvPoints {
    fn point(&mut self, writer: &mut dyn Write, point: &Point) -> Result<(), CliError> {
        let keys = ordered_keys(point);
        if self.headers.iter().map(String::as_str).ne(keys.iter().copied()) {
            writeln!(writer, "#{}", keys.join(","))?;
            self.headers = keys.iter().map(ToString::to_string).collect();
        }
        let values: Vec<String> = keys.iter().map(|key| plain(&point[*key])).collect();
        writeln!(writer, "{}", values.join(","))?;
        Ok(())
    }
}

fn ordered_keys(point: &Point) -> Vec<&str> {
    let sorted: BTreeSet<&str> = point.keys().map(String::as_str).collect();
    let mut keys = Vec::with_capacity(sorted.len());
    if sorted.contains("time") {
        keys.push("time");
    }
    keys.extend(sorted.into_iter().filter(|k| *k != "time"));
    keys
}

/// Strings unquoted, everything else as JSON.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a stream diagnostic as one line.
///
/// With a source location: `Error line 1, column 2 of main: message`.
/// Without: `Error (message): info`.
#[must_use]
pub fn render_diagnostic(prefix: &str, context: &Value) -> String {
    let Some(message) = context.get("message") else {
        return format!("{prefix}: {}", plain(context));
    };
    let message = plain(message);
    let info = context.get("info");

    if let Some(location) = info.and_then(|i| i.get("location")) {
        let start = location.get("start");
        let line = start.and_then(|s| s.get("line")).map_or_else(String::new, plain);
        let column = start.and_then(|s| s.get("column")).map_or_else(String::new, plain);
        let file = location.get("filename").map_or_else(String::new, plain);
        return format!("{prefix} line {line}, column {column} of {file}: {message}");
    }

    match info {
        Some(info) if !info.is_null() => format!("{prefix} ({message}): {}", plain(info)),
        _ => format!("{prefix}: {message}"),
    }
}

/// Routes stream events to the point formatter and diagnostics to stderr.
pub struct EventPrinter {
    formatter: Box<dyn PointFormatter>,
    persist: bool,
    show_progress: bool,
    points: u64,
    hit_error: bool,
}

impl std::fmt::Debug for EventPrinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPrinter")
            .field("points", &self.points)
            .field("hit_error", &self.hit_error)
            .finish_non_exhaustive()
    }
}

impl EventPrinter {
    /// Create a printer.
    #[must_use]
    pub fn new(format: PointFormat, persist: bool, show_progress: bool) -> Self {
        Self {
            formatter: point_formatter(format, persist),
            persist,
            show_progress,
            points: 0,
            hit_error: false,
        }
    }

    /// Points rendered so far.
    #[must_use]
    pub const fn points(&self) -> u64 {
        self.points
    }

    /// Whether an error event was seen.
    #[must_use]
    pub const fn hit_error(&self) -> bool {
        self.hit_error
    }

    /// Start the output document.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn start(&mut self, out: &mut dyn Write) -> Result<(), CliError> {
        self.formatter.start(out)
    }

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn event(
        &mut self,
        out: &mut dyn Write,
        diag: &mut dyn Write,
        event: &StreamEvent,
    ) -> Result<(), CliError> {
        match event {
            StreamEvent::JobStarted(info) => {
                if self.persist {
                    writeln!(out, "{}", info.job_id())?;
                }
            }
            StreamEvent::Points { points, .. } => {
                for point in points {
                    self.formatter.point(out, point)?;
                }
                self.points += points.len() as u64;
            }
            StreamEvent::Error { context } => {
                writeln!(diag, "{}", render_diagnostic("Error", context))?;
                self.hit_error = true;
            }
            StreamEvent::Warning { context } => {
                writeln!(diag, "{}", render_diagnostic("Warning", context))?;
            }
            StreamEvent::SinkEnd { .. }
            | StreamEvent::JobEnd
            | StreamEvent::Tick
            | StreamEvent::Ping => {}
        }

        if self.show_progress && !event.is_keepalive() {
            write!(diag, "streamed {} points\r", self.points)?;
            diag.flush()?;
        }
        Ok(())
    }

    /// Close the output document.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn stop(&mut self, out: &mut dyn Write) -> Result<(), CliError> {
        self.formatter.stop(out)?;
        out.flush()?;
        Ok(())
    }
}
