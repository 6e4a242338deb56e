//! Output formatting: table, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde. Event-log lines go to stderr so stdout
//! stays machine-readable.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use fieldmon_core::{LogEntry, Notification, NotificationLevel, Severity};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// `json-compact` emits one document for the whole list; streaming callers
/// render item by item to get JSON lines.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> Vec<R>,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().flat_map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Render a single item. Table rendering uses `detail_fn`, since detail
/// views are key/value text rather than `Tabled` rows.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Event log & notifications ────────────────────────────────────────

pub fn print_log_entry(entry: &LogEntry, color: bool, quiet: bool) {
    if quiet {
        return;
    }
    let time = entry.timestamp.format("%H:%M:%S").to_string();
    let tag = format!("[{}]", entry.severity);
    let line = if color {
        let tag = match entry.severity {
            Severity::Info => tag.cyan().to_string(),
            Severity::Success => tag.green().to_string(),
            Severity::Warning => tag.yellow().to_string(),
            Severity::Error => tag.red().bold().to_string(),
        };
        format!("{} {tag} {}", time.dimmed(), entry.message)
    } else {
        format!("{time} {tag} {}", entry.message)
    };
    let _ = writeln!(io::stderr().lock(), "{line}");
}

/// Notifications are printed even in quiet mode.
pub fn print_notification(note: &Notification, color: bool) {
    let title = if color {
        match note.level {
            NotificationLevel::Error => note.title.red().bold().to_string(),
            NotificationLevel::Warning => note.title.yellow().bold().to_string(),
            NotificationLevel::Success => note.title.green().bold().to_string(),
            NotificationLevel::Info => note.title.bold().to_string(),
        }
    } else {
        note.title.clone()
    };
    let _ = writeln!(io::stderr().lock(), "{title}: {}", note.message);
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(
    data: &T,
    compact: bool,
) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Serialization(e.to_string()))
}

pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Serialization(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Item {
        name: &'static str,
        value: u32,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Name")]
        name: String,
    }

    fn items() -> Vec<Item> {
        vec![Item { name: "a", value: 1 }, Item { name: "b", value: 2 }]
    }

    #[test]
    fn table_uses_rows() {
        let out = render_list(OutputFormat::Table, &items(), |i| {
            vec![Row { name: i.name.into() }]
        })
        .unwrap();
        assert!(out.contains("Name"));
        assert!(out.contains('╭'));
    }

    #[test]
    fn compact_json_is_one_line() {
        let out = render_list(OutputFormat::JsonCompact, &items(), |_| Vec::<Row>::new()).unwrap();
        assert_eq!(out, r#"[{"name":"a","value":1},{"name":"b","value":2}]"#);
    }

    #[test]
    fn single_yaml() {
        let out = render_single(OutputFormat::Yaml, &Item { name: "x", value: 7 }, |_| {
            String::new()
        })
        .unwrap();
        assert_eq!(out, "name: x\nvalue: 7\n");
    }
}
