//! Download-as-file action for rendered images: the file name comes from the
//! alt text, the extension from the response content type. The byte fetch
//! itself lives in the host/tokio layer; this module only plans and performs
//! the save through an [`ExportSink`].

use crate::export::{ExportError, ExportSink};

fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        _ => "png",
    }
}

fn sanitize_stem(alt: &str) -> String {
    let mut out = String::with_capacity(alt.len());
    for c in alt.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.trim_matches('_').is_empty() {
        "image".to_string()
    } else {
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSavePlan {
    pub file_name: String,
}

impl ImageSavePlan {
    pub fn new(alt: &str, content_type: &str) -> Self {
        Self {
            file_name: format!("{}.{}", sanitize_stem(alt), extension_for(content_type)),
        }
    }

    pub fn save(
        &self,
        bytes: &[u8],
        streaming: bool,
        sink: &dyn ExportSink,
    ) -> Result<(), ExportError> {
        if streaming {
            return Err(ExportError::StreamingInProgress);
        }
        sink.save_file(&self.file_name, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_comes_from_alt_and_content_type() {
        let plan = ImageSavePlan::new("Sales chart, Q3!", "image/jpeg");
        assert_eq!(plan.file_name, "Sales_chart__Q3_.jpg");
    }

    #[test]
    fn empty_alt_falls_back_to_generic_stem() {
        let plan = ImageSavePlan::new("", "image/png");
        assert_eq!(plan.file_name, "image.png");
        let plan = ImageSavePlan::new("???", "image/webp");
        assert_eq!(plan.file_name, "image.webp");
    }

    #[test]
    fn unknown_content_type_defaults_to_png() {
        let plan = ImageSavePlan::new("x", "application/octet-stream");
        assert_eq!(plan.file_name, "x.png");
        let plan = ImageSavePlan::new("x", "image/svg+xml; charset=utf-8");
        assert_eq!(plan.file_name, "x.svg");
    }
}
