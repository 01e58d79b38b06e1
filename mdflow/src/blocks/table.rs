//! Table clipboard export: inline-styled HTML for rich-text editors plus a
//! tab-separated plain-text rendering, written together so the paste target
//! chooses its preferred representation.

use crate::export::{ExportError, ExportSink};
use crate::tree::{ColumnAlignment, InlineNode, TableBlock, plain_text};

const TABLE_STYLE: &str = "border-collapse:collapse;font-family:ui-sans-serif,system-ui,sans-serif;font-size:14px";
const CELL_STYLE: &str = "border:1px solid #d1d5db;padding:6px 10px";
const HEADER_STYLE: &str = "border:1px solid #d1d5db;padding:6px 10px;font-weight:600;background:#f3f4f6";

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn alignment_css(alignment: ColumnAlignment) -> Option<&'static str> {
    match alignment {
        ColumnAlignment::None => None,
        ColumnAlignment::Left => Some("text-align:left"),
        ColumnAlignment::Center => Some("text-align:center"),
        ColumnAlignment::Right => Some("text-align:right"),
    }
}

fn push_cell(
    out: &mut String,
    tag: &str,
    base_style: &str,
    alignment: ColumnAlignment,
    content: &[InlineNode],
) {
    out.push('<');
    out.push_str(tag);
    out.push_str(" style=\"");
    out.push_str(base_style);
    if let Some(align) = alignment_css(alignment) {
        out.push(';');
        out.push_str(align);
    }
    out.push_str("\">");
    escape_html(&plain_text(content), out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn alignment_for(table: &TableBlock, column: usize) -> ColumnAlignment {
    table
        .alignments
        .get(column)
        .copied()
        .unwrap_or(ColumnAlignment::None)
}

/// Inline-styled HTML clone of the table, suitable for pasting into
/// spreadsheet and word-processor targets.
pub fn table_html(table: &TableBlock) -> String {
    let mut out = String::new();
    out.push_str("<table style=\"");
    out.push_str(TABLE_STYLE);
    out.push_str("\"><thead><tr>");
    for (column, cell) in table.header.iter().enumerate() {
        push_cell(&mut out, "th", HEADER_STYLE, alignment_for(table, column), cell);
    }
    out.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        out.push_str("<tr>");
        for (column, cell) in row.iter().enumerate() {
            push_cell(&mut out, "td", CELL_STYLE, alignment_for(table, column), cell);
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

/// Tab-separated rendering for plain-text paste targets.
pub fn table_plain_text(table: &TableBlock) -> String {
    let mut out = String::new();
    let mut push_row = |cells: &[Vec<InlineNode>], out: &mut String| {
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                out.push('\t');
            }
            out.push_str(&plain_text(cell));
        }
        out.push('\n');
    };
    push_row(&table.header, &mut out);
    for row in &table.rows {
        push_row(row, &mut out);
    }
    out
}

/// Copy the table for rich-text paste. On clipboard failure the raw HTML is
/// written as plain text before giving up.
pub fn copy_for_word_processor(
    table: &TableBlock,
    streaming: bool,
    sink: &dyn ExportSink,
) -> Result<(), ExportError> {
    if streaming {
        return Err(ExportError::StreamingInProgress);
    }
    let html = table_html(table);
    let text = table_plain_text(table);
    match sink.write_clipboard(&html, &text) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::warn!(%err, "rich clipboard write failed, falling back to plain text");
            sink.write_clipboard_text(&html)
        }
    }
}
