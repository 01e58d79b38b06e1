#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Render inline in the message flow.
    Plain,
    /// Treat the buffer as a full document: strip a wrapping code fence and
    /// force a prose layout.
    Report,
}

#[derive(Debug, Clone)]
pub struct RepairOptions {
    pub fenced_code: bool,
    pub emphasis: bool,
    pub inline_code: bool,
    pub strikethrough: bool,
    pub math: bool,
    pub links: bool,
    pub headings: bool,
    pub list_lines: bool,
    pub setext_guard: bool,
    /// Tail-only scan window for the repair pass.
    pub window_bytes: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            fenced_code: true,
            emphasis: true,
            inline_code: true,
            strikethrough: true,
            math: true,
            links: true,
            headings: true,
            list_lines: true,
            setext_guard: true,
            window_bytes: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub repair: RepairOptions,
    /// Trailing marker shown while the buffer is still growing.
    pub cursor_glyph: String,
    /// Fence info-string languages routed to the diagram renderer.
    pub diagram_languages: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            repair: RepairOptions::default(),
            cursor_glyph: "\u{258d}".to_string(),
            diagram_languages: vec!["mermaid".to_string()],
        }
    }
}

impl RenderOptions {
    pub fn is_diagram_language(&self, language: &str) -> bool {
        let l = language.to_ascii_lowercase();
        self.diagram_languages.iter().any(|d| d == &l)
    }
}
