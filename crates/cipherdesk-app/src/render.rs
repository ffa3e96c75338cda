//! Terminal formatting of message fragments.

use chrono::Local;
use colored::*;

use cipherdesk_chat::{Fragment, PageControls, TableFragment};
use cipherdesk_core::types::Role;

/// Cells wider than this are cut with an ellipsis.
const MAX_CELL_WIDTH: usize = 40;

fn width(text: &str) -> usize {
    text.chars().count()
}

fn fit(text: &str) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if width(&flat) <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut cut: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
    cut.push('…');
    cut
}

fn pad(text: &str, to: usize) -> String {
    let fill = to.saturating_sub(width(text));
    format!("{}{}", text, " ".repeat(fill))
}

/// Page controls; disabled ones are dimmed.
pub fn render_controls(controls: &PageControls) -> String {
    let control = |label: &str, enabled: bool| {
        if enabled {
            label.bright_cyan().to_string()
        } else {
            label.dimmed().to_string()
        }
    };
    format!(
        "{} {}  page {}/{}  {} {}",
        control("/first", controls.first),
        control("/prev", controls.prev),
        controls.current_page,
        controls.total_pages,
        control("/next", controls.next),
        control("/last", controls.last),
    )
}

/// Boxed table with caption and controls.
///
/// `export_hint` marks the table `/export` acts on, the most recent one.
pub fn render_table(table: &TableFragment, export_hint: bool) -> String {
    let mut out = Vec::new();
    if let Some(title) = &table.title {
        out.push(title.bold().to_string());
    }

    if !table.headers.is_empty() {
        let headers: Vec<String> = table.headers.iter().map(|h| fit(h)).collect();
        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| row.iter().map(|c| fit(c)).collect())
            .collect();
        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                rows.iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| width(c))
                    .chain(std::iter::once(width(h)))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let rule = |left: &str, mid: &str, right: &str| {
            let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}", left, parts.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| {
            let parts: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = pad(cells.get(i).map(String::as_str).unwrap_or(""), *w);
                    if bold {
                        format!(" {} ", cell.bold())
                    } else {
                        format!(" {} ", cell)
                    }
                })
                .collect();
            format!("│{}│", parts.join("│"))
        };

        out.push(rule("┌", "┬", "┐"));
        out.push(line(headers.as_slice(), true));
        out.push(rule("├", "┼", "┤"));
        for row in &rows {
            out.push(line(row.as_slice(), false));
        }
        out.push(rule("└", "┴", "┘"));
    }

    out.push(table.caption.dimmed().to_string());
    if let Some(controls) = &table.controls {
        out.push(render_controls(controls));
    }
    if export_hint && table.exportable {
        out.push(format!("{}", "/export saves this table as CSV".dimmed()));
    }
    out.join("\n")
}

/// A whole message.
pub fn render_fragment(fragment: &Fragment) -> String {
    let time = fragment.timestamp.with_timezone(&Local).format("%H:%M");
    let speaker = match fragment.role {
        Role::User => "you".bright_blue().bold(),
        Role::Assistant => "assistant".bright_green().bold(),
    };
    let mut out = vec![format!("{} {}", speaker, time.to_string().dimmed())];
    out.push(fragment.text.clone());

    if let Some(error) = &fragment.error {
        out.push(format!("{} {}", "Error:".bright_red().bold(), error.red()));
    }
    if let Some(notice) = &fragment.notice {
        out.push(format!("🔒 {}", notice.yellow()));
    }
    let last = fragment.tables.len().saturating_sub(1);
    for (i, table) in fragment.tables.iter().enumerate() {
        out.push(render_table(table, i == last));
    }
    if !fragment.suggestions.is_empty() {
        out.push("Try next:".bright_black().to_string());
        for suggestion in &fragment.suggestions {
            out.push(format!("  • {}", suggestion.cyan()));
        }
    }
    out.join("\n")
}

pub fn help_text() -> String {
    [
        ("/mode [chat|sql]", "toggle or set the input mode"),
        ("/clear", "start over from the greeting"),
        ("/voice", "start or stop voice input"),
        ("/first /prev /next /last", "page the most recent table"),
        ("/page N", "jump to page N of the most recent table"),
        ("/export", "save the most recent table as CSV"),
        ("/health", "check the query server"),
        ("/help", "show this help"),
        ("/quit", "leave"),
    ]
    .iter()
    .map(|(cmd, what)| format!("  {} {}", pad(cmd, 26).bright_cyan(), what))
    .collect::<Vec<_>>()
    .join("\n")
}
