//! Plain-text tables for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    aggregate::Aggregate,
    data::{format_number, parse_number},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Renders rows under `headers`. Columns whose non-empty cells are all
/// numeric are right-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }
    let aligns = (0..column_count)
        .map(|idx| column_alignment(rows, idx))
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &aligns));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &aligns));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &aligns));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Two-column table of group names and values, in aggregate order.
pub fn render_aggregate(key_header: &str, value_header: &str, aggregate: &Aggregate) -> String {
    let rows = aggregate
        .entries()
        .iter()
        .map(|entry| vec![entry.name.clone(), format_number(entry.value)])
        .collect::<Vec<_>>();
    render_table(&[key_header.to_string(), value_header.to_string()], &rows)
}

pub fn print_aggregate(key_header: &str, value_header: &str, aggregate: &Aggregate) {
    print!("{}", render_aggregate(key_header, value_header, aggregate));
}

fn column_alignment(rows: &[Vec<String>], idx: usize) -> Align {
    let mut values = rows
        .iter()
        .filter_map(|row| row.get(idx))
        .filter(|cell| !cell.trim().is_empty())
        .peekable();
    if values.peek().is_none() {
        return Align::Left;
    }
    if values.all(|cell| parse_number(cell).is_some()) {
        Align::Right
    } else {
        Align::Left
    }
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let cells = values
        .iter()
        .zip(widths.iter().zip(aligns))
        .map(|(value, (width, align))| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            match align {
                Align::Left => format!("{sanitized}{padding}"),
                Align::Right => format!("{padding}{sanitized}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape sequence, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
