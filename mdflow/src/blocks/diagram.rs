//! Text-to-graphic diagram pipeline: source preprocessing, a host-supplied
//! compiler seam, a generation-keyed view state machine (stale compiles are
//! dropped), and the padded/watermarked SVG export.

use thiserror::Error;

use crate::export::{ExportError, ExportSink};
use crate::theme::DiagramTheme;

/// Collapse spurious whitespace between a node identifier and its following
/// bracket/paren/brace (`A [Label]` → `A[Label]`), a frequent model mistake
/// that fails to compile. Quoted strings are left untouched.
pub fn preprocess_diagram(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut in_quote = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            in_quote = !in_quote;
        }
        if !in_quote && (b == b' ' || b == b'\t') {
            let prev_is_ident = out
                .bytes()
                .next_back()
                .is_some_and(|p| p.is_ascii_alphanumeric() || p == b'_');
            let mut j = i;
            while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                j += 1;
            }
            let next_opens = bytes
                .get(j)
                .is_some_and(|n| matches!(n, b'[' | b'(' | b'{'));
            if prev_is_ident && next_opens {
                i = j;
                continue;
            }
        }
        let ch_len = source[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&source[i..i + ch_len]);
        i += ch_len;
    }
    out
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DiagramError {
    pub message: String,
}

impl DiagramError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDiagram {
    pub svg: String,
}

/// Host-supplied compiler (e.g. a mermaid bridge). Receives the preprocessed
/// source with the theme's init directive prepended.
pub trait DiagramCompiler: Send + Sync {
    fn compile(&self, source: &str, theme: &DiagramTheme) -> Result<CompiledDiagram, DiagramError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramState {
    /// No compile attempted yet.
    Idle,
    /// A compile is scheduled or in flight; keep showing the previous state's
    /// content (or the source text) meanwhile.
    Waiting,
    Rendered(CompiledDiagram),
    /// Compile failed: the view shows the source text plus the message and a
    /// retry control, never a blank panel.
    Failed { message: String },
}

/// Per-diagram view state. Every source change bumps the generation; only a
/// result committed with the current generation is accepted, so a stale
/// in-flight compile that resolves late is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramView {
    source: String,
    generation: u64,
    state: DiagramState,
}

impl DiagramView {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            generation: 0,
            state: DiagramState::Idle,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &DiagramState {
        &self.state
    }

    /// Replace the source text. Returns the generation a compile result must
    /// carry to be accepted; unchanged source keeps the current generation.
    pub fn set_source(&mut self, source: &str) -> u64 {
        if self.source != source {
            self.source = source.to_string();
            self.generation += 1;
            self.state = DiagramState::Waiting;
        }
        self.generation
    }

    /// Re-arm after a failure, bumping the generation so an older in-flight
    /// compile cannot overwrite the retry's result.
    pub fn retry(&mut self) -> u64 {
        self.generation += 1;
        self.state = DiagramState::Waiting;
        self.generation
    }

    /// Run the compiler against the current source. The caller commits the
    /// tagged result with [`DiagramView::commit`]; splitting the two steps
    /// lets the compile run off the hot path.
    pub fn compile_with(
        &self,
        compiler: &dyn DiagramCompiler,
        theme: &DiagramTheme,
    ) -> (u64, Result<CompiledDiagram, DiagramError>) {
        let prepared = format!("{}\n{}", theme.init_directive(), preprocess_diagram(&self.source));
        (self.generation, compiler.compile(&prepared, theme))
    }

    /// Accept a compile result. Returns false (and changes nothing) when the
    /// generation is stale.
    pub fn commit(
        &mut self,
        generation: u64,
        result: Result<CompiledDiagram, DiagramError>,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "dropping stale diagram compile");
            return false;
        }
        self.state = match result {
            Ok(compiled) => DiagramState::Rendered(compiled),
            Err(err) => {
                tracing::debug!(%err, "diagram compile failed");
                DiagramState::Failed {
                    message: err.message,
                }
            }
        };
        true
    }
}

#[derive(Debug, Clone)]
pub struct SvgExportOptions {
    pub padding: f64,
    pub watermark: String,
    pub file_name: String,
}

impl Default for SvgExportOptions {
    fn default() -> Self {
        Self {
            padding: 16.0,
            watermark: "made with mdflow".to_string(),
            file_name: "diagram.svg".to_string(),
        }
    }
}

fn parse_view_box(svg: &str) -> Option<(usize, usize, [f64; 4])> {
    let attr_start = svg.find("viewBox=\"")?;
    let value_start = attr_start + "viewBox=\"".len();
    let value_len = svg[value_start..].find('"')?;
    let raw = &svg[value_start..value_start + value_len];
    let mut nums = [0f64; 4];
    let mut it = raw.split_whitespace();
    for slot in &mut nums {
        *slot = it.next()?.parse().ok()?;
    }
    if it.next().is_some() {
        return None;
    }
    Some((value_start, value_len, nums))
}

/// Pad the canvas and inject a small watermark label before the closing tag.
/// Rasterizing the result is the host sink's concern. On any shape the
/// parser does not understand, the SVG is returned unchanged.
pub fn decorate_svg(svg: &str, opts: &SvgExportOptions) -> String {
    let Some((value_start, value_len, [x, y, w, h])) = parse_view_box(svg) else {
        return svg.to_string();
    };
    let Some(close) = svg.rfind("</svg>") else {
        return svg.to_string();
    };

    let pad = opts.padding;
    let label_space = if opts.watermark.is_empty() { 0.0 } else { 14.0 };
    let view_box = format!(
        "{} {} {} {}",
        x - pad,
        y - pad,
        w + pad * 2.0,
        h + pad * 2.0 + label_space
    );

    let mut out = String::with_capacity(svg.len() + opts.watermark.len() + 96);
    out.push_str(&svg[..value_start]);
    out.push_str(&view_box);
    out.push_str(&svg[value_start + value_len..close]);
    if !opts.watermark.is_empty() {
        out.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" opacity=\"0.55\" text-anchor=\"end\">",
            x + w,
            y + h + pad + 10.0
        ));
        for c in opts.watermark.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                _ => out.push(c),
            }
        }
        out.push_str("</text>");
    }
    out.push_str(&svg[close..]);
    out
}

/// Save the compiled diagram through the sink, decorated for download.
pub fn save_diagram(
    diagram: &CompiledDiagram,
    opts: &SvgExportOptions,
    streaming: bool,
    sink: &dyn ExportSink,
) -> Result<(), ExportError> {
    if streaming {
        return Err(ExportError::StreamingInProgress);
    }
    let decorated = decorate_svg(&diagram.svg, opts);
    sink.save_file(&opts.file_name, decorated.as_bytes())
}
