//! Cleanup applied to the raw buffer before parsing: stray structured-log
//! lines, alternate LaTeX delimiter styles, and (in report mode) a
//! document-wrapping code fence some models emit around an entire answer.

use crate::options::RenderMode;

fn is_fence_line(line: &str) -> bool {
    let mut s = line;
    let mut spaces = 0usize;
    while spaces < 3 && s.starts_with(' ') {
        s = &s[1..];
        spaces += 1;
    }
    s.starts_with("```") || s.starts_with("~~~")
}

/// A whole line that parses as a JSON object carrying a `timestamp` or
/// `level` key is diagnostic leakage, not content.
fn is_log_fragment_line(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return false;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return false;
    };
    let Some(obj) = value.as_object() else {
        return false;
    };
    obj.contains_key("timestamp") || obj.contains_key("level")
}

fn strip_log_fragments(text: &str) -> String {
    if !text.contains('{') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;
    for line in text.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        if is_fence_line(body) {
            in_fence = !in_fence;
            out.push_str(line);
            continue;
        }
        if !in_fence && is_log_fragment_line(body) {
            continue;
        }
        out.push_str(line);
    }
    out
}

/// Counts single backticks (triple runs excluded) before `index` to decide
/// whether a rewrite site is inside code.
fn inside_code(text: &str, index: usize) -> bool {
    let bytes = text.as_bytes();
    let mut singles = 0usize;
    let mut fences = 0usize;
    let mut i = 0usize;
    while i < index && i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'`' {
            let mut run = 0usize;
            while i + run < bytes.len() && bytes[i + run] == b'`' {
                run += 1;
            }
            fences += run / 3;
            if fences % 2 == 0 {
                singles += run % 3;
            }
            i += run;
            continue;
        }
        i += 1;
    }
    fences % 2 == 1 || singles % 2 == 1
}

/// Rewrite `\[ … \]` to `$$ … $$` and `\( … \)` to `$ … $`, non-greedily,
/// leaving the delimited content untouched.
fn rewrite_latex_delimiters(text: &str) -> String {
    if !text.contains("\\[") && !text.contains("\\(") {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let opener = bytes[i + 1];
            let (closer, dollars): (&str, &str) = match opener {
                b'[' => ("\\]", "$$"),
                b'(' => ("\\)", "$"),
                _ => {
                    // Not a math delimiter; the escaped character may be
                    // multibyte, so emit the backslash alone.
                    out.push('\\');
                    i += 1;
                    continue;
                }
            };
            if inside_code(text, i) {
                out.push_str(&text[i..i + 2]);
                i += 2;
                continue;
            }
            let Some(rel) = text[i + 2..].find(closer) else {
                out.push_str(&text[i..i + 2]);
                i += 2;
                continue;
            };
            let body = &text[i + 2..i + 2 + rel];
            out.push_str(dollars);
            out.push_str(body);
            out.push_str(dollars);
            i += 2 + rel + 2;
            continue;
        }
        let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Undo the failure mode of wrapping an entire report in a code fence: strip
/// an opening ```` ```markdown ```` (or bare fence) line and a closing fence.
fn strip_document_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(first_line_end) = trimmed.find('\n') else {
        // Only the opener has arrived so far.
        if trimmed == "```" || trimmed.eq_ignore_ascii_case("```markdown") {
            return String::new();
        }
        return trimmed.to_string();
    };
    let first_line = trimmed[..first_line_end].trim_end();
    let wrapped = first_line == "```" || first_line.eq_ignore_ascii_case("```markdown");
    if !wrapped {
        return trimmed.to_string();
    }
    let mut body = &trimmed[first_line_end + 1..];
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim().to_string()
}

/// Normalize a raw buffer for parsing. Pure and total: identical input and
/// mode always yield identical output.
pub fn normalize_markdown(text: &str, mode: RenderMode) -> String {
    let text = strip_log_fragments(text);
    let text = rewrite_latex_delimiters(&text);
    match mode {
        RenderMode::Plain => text,
        RenderMode::Report => strip_document_fence(&text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_fragment_lines_are_dropped() {
        let text = "Before\n{\"level\":\"info\",\"msg\":\"tick\"}\nAfter\n";
        assert_eq!(
            normalize_markdown(text, RenderMode::Plain),
            "Before\nAfter\n"
        );
    }

    #[test]
    fn log_shaped_lines_inside_fences_survive() {
        let text = "```json\n{\"level\":\"info\"}\n```\n";
        assert_eq!(normalize_markdown(text, RenderMode::Plain), text);
    }

    #[test]
    fn ordinary_json_lines_survive() {
        let text = "{\"name\":\"value\"}\n";
        assert_eq!(normalize_markdown(text, RenderMode::Plain), text);
    }

    #[test]
    fn bracket_latex_becomes_block_math() {
        assert_eq!(
            normalize_markdown("Given \\[x^2 + y^2 = r^2\\] we solve.", RenderMode::Plain),
            "Given $$x^2 + y^2 = r^2$$ we solve."
        );
    }

    #[test]
    fn paren_latex_becomes_inline_math() {
        assert_eq!(
            normalize_markdown("energy \\(E = mc^2\\) here", RenderMode::Plain),
            "energy $E = mc^2$ here"
        );
    }

    #[test]
    fn latex_rewrite_skips_code_spans() {
        let text = "literal `\\[x\\]` stays";
        assert_eq!(normalize_markdown(text, RenderMode::Plain), text);
    }

    #[test]
    fn unterminated_latex_delimiter_is_left_alone() {
        let text = "partial \\[x^2";
        assert_eq!(normalize_markdown(text, RenderMode::Plain), text);
    }

    #[test]
    fn backslash_before_multibyte_text_is_preserved() {
        assert_eq!(
            normalize_markdown("stray \\é then \\(x\\)", RenderMode::Plain),
            "stray \\é then $x$"
        );
    }

    #[test]
    fn report_mode_strips_wrapping_fence() {
        assert_eq!(
            normalize_markdown("```markdown\n# Title\n```", RenderMode::Report),
            "# Title"
        );
        assert_eq!(
            normalize_markdown("```\n# Title\n\nBody.\n```\n", RenderMode::Report),
            "# Title\n\nBody."
        );
    }

    #[test]
    fn report_mode_leaves_unwrapped_documents() {
        assert_eq!(
            normalize_markdown("# Title\n\nBody.", RenderMode::Report),
            "# Title\n\nBody."
        );
    }

    #[test]
    fn plain_mode_keeps_leading_fence() {
        let text = "```python\nprint(1)\n```";
        assert_eq!(normalize_markdown(text, RenderMode::Plain), text);
    }
}
