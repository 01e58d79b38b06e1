use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// Palette handed to the diagram compiler. Chosen from the document theme at
/// compile time, not at render time, so an already-rendered diagram keeps its
/// colors until it is recompiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramTheme {
    pub base: &'static str,
    pub background: &'static str,
    pub primary_color: &'static str,
    pub primary_text_color: &'static str,
    pub primary_border_color: &'static str,
    pub line_color: &'static str,
    pub font_family: &'static str,
}

impl DiagramTheme {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                base: "neutral",
                background: "#ffffff",
                primary_color: "#eef2ff",
                primary_text_color: "#1f2937",
                primary_border_color: "#6366f1",
                line_color: "#4b5563",
                font_family: "ui-sans-serif, system-ui, sans-serif",
            },
            Theme::Dark => Self {
                base: "dark",
                background: "#111827",
                primary_color: "#312e81",
                primary_text_color: "#e5e7eb",
                primary_border_color: "#818cf8",
                line_color: "#9ca3af",
                font_family: "ui-sans-serif, system-ui, sans-serif",
            },
        }
    }

    /// Init directive prepended to the diagram source before compilation.
    pub fn init_directive(&self) -> String {
        let init = json!({
            "theme": self.base,
            "themeVariables": {
                "background": self.background,
                "primaryColor": self.primary_color,
                "primaryTextColor": self.primary_text_color,
                "primaryBorderColor": self.primary_border_color,
                "lineColor": self.line_color,
                "fontFamily": self.font_family,
            }
        });
        format!("%%{{init: {init}}}%%")
    }
}
