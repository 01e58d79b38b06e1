//! Bracketed numeric citation markers (`[3]`) and the source entries they
//! resolve to.

use serde::{Deserialize, Serialize};

/// A bibliographic entry addressable by integer id from inline `[n]` markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: u32,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineSeg {
    Text(String),
    Citation(u32),
}

/// Split a plain-text inline run into text and citation-marker segments.
///
/// Only the exact token "open bracket, one or more digits, close bracket" is
/// a citation; bracket contents with any non-digit stay literal text.
pub fn split_citations(text: &str) -> Vec<InlineSeg> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut plain_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }
        let digits_start = i + 1;
        let mut j = digits_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let is_marker = j > digits_start && bytes.get(j) == Some(&b']');
        if !is_marker {
            i += 1;
            continue;
        }
        let Ok(id) = text[digits_start..j].parse::<u32>() else {
            // Digit runs too long for an id stay literal.
            i = j + 1;
            continue;
        };
        if plain_start < i {
            out.push(InlineSeg::Text(text[plain_start..i].to_string()));
        }
        out.push(InlineSeg::Citation(id));
        i = j + 1;
        plain_start = i;
    }

    if plain_start < text.len() {
        out.push(InlineSeg::Text(text[plain_start..].to_string()));
    }
    out
}

/// The source entries for one message, looked up by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceList {
    sources: Vec<Source>,
}

impl SourceList {
    pub fn new(sources: Vec<Source>) -> Self {
        debug_assert!(sources.iter().all(|s| s.id >= 1), "source ids start at 1");
        Self { sources }
    }

    pub fn get(&self, id: u32) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Emitted when a citation marker is activated; the host decides whether and
/// how to bring the source into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationEvent {
    pub id: u32,
    /// False when no source with this id exists; activation still succeeds
    /// and simply has no visible target.
    pub source_found: bool,
}

/// Active-source selection for one message view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CitationState {
    active: Option<u32>,
}

impl CitationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<u32> {
        self.active
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn activate(&mut self, id: u32, sources: &SourceList) -> CitationEvent {
        self.active = Some(id);
        CitationEvent {
            id,
            source_found: sources.get(id).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(id: u32) -> Source {
        Source {
            id,
            title: format!("Source {id}"),
            url: format!("https://example.com/{id}"),
            snippet: None,
            journal: None,
            year: None,
            authors: None,
            source_type: None,
        }
    }

    #[test]
    fn digit_brackets_become_markers() {
        let segs = split_citations("See [2] and [10] but not [2a].");
        assert_eq!(
            segs,
            vec![
                InlineSeg::Text("See ".to_string()),
                InlineSeg::Citation(2),
                InlineSeg::Text(" and ".to_string()),
                InlineSeg::Citation(10),
                InlineSeg::Text(" but not [2a].".to_string()),
            ]
        );
    }

    #[test]
    fn non_digit_brackets_stay_literal() {
        for text in ["[]", "[2,3]", "[2-4]", "[ 2]", "see [note]"] {
            assert_eq!(split_citations(text), vec![InlineSeg::Text(text.to_string())]);
        }
    }

    #[test]
    fn adjacent_markers_split_cleanly() {
        let segs = split_citations("[1][2]");
        assert_eq!(segs, vec![InlineSeg::Citation(1), InlineSeg::Citation(2)]);
    }

    #[test]
    fn oversized_ids_stay_literal() {
        let text = "[99999999999999999999]";
        assert_eq!(split_citations(text), vec![InlineSeg::Text(text.to_string())]);
    }

    #[test]
    fn activation_with_unknown_id_does_not_fail() {
        let sources = SourceList::new(vec![src(2), src(10)]);
        let mut state = CitationState::new();

        let hit = state.activate(2, &sources);
        assert!(hit.source_found);
        assert_eq!(state.active(), Some(2));

        let miss = state.activate(7, &sources);
        assert!(!miss.source_found);
        assert_eq!(state.active(), Some(7));
    }
}
