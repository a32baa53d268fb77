use serde::{Deserialize, Serialize};

pub const MAX_LINKS: usize = 50;
pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MAX_CATEGORIES: usize = 10;
pub const MAX_SECTIONS: usize = 15;
pub const MAX_IMAGES: usize = 3;
pub const MAX_REFERENCES: usize = 5;

/// Everything a fetcher reports about one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Outbound article titles, in the order the source returns them
    /// (MediaWiki sorts by namespace, then title).
    pub links: Vec<String>,
    pub summary: String,
    pub url: String,
    /// Leading slice of the body text.
    pub content: String,
    pub categories: Vec<String>,
    pub sections: Vec<String>,
    pub images: Vec<String>,
    pub references: Vec<String>,
    /// Length of the whole body, in characters, before truncation.
    pub content_length: usize,
    pub word_count: usize,
}

impl PageMetadata {
    pub fn new(url: String) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }

    /// Builds metadata from a full body text, filling the length and word
    /// counts from the untruncated text.
    pub fn with_body(url: String, summary: String, body: &str) -> Self {
        Self {
            url,
            summary,
            content: body.to_string(),
            content_length: body.chars().count(),
            word_count: body.split_whitespace().count(),
            ..Self::default()
        }
    }

    /// Clamps every sequence and the content to the boundary caps.
    pub fn bounded(mut self) -> Self {
        self.links.truncate(MAX_LINKS);
        self.categories.truncate(MAX_CATEGORIES);
        self.sections.truncate(MAX_SECTIONS);
        self.images.truncate(MAX_IMAGES);
        self.references.truncate(MAX_REFERENCES);
        self.content = truncate_chars(&self.content, MAX_CONTENT_CHARS);
        self
    }
}

/// Returns at most `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_applies_caps() {
        let mut page = PageMetadata::new("https://example.org/wiki/X".into());
        page.links = (0..80).map(|i| format!("L{}", i)).collect();
        page.categories = (0..20).map(|i| format!("C{}", i)).collect();
        page.sections = (0..20).map(|i| format!("S{}", i)).collect();
        page.images = (0..9).map(|i| format!("I{}", i)).collect();
        page.references = (0..9).map(|i| format!("R{}", i)).collect();
        page.content = "x".repeat(5000);

        let page = page.bounded();
        assert_eq!(page.links.len(), MAX_LINKS);
        assert_eq!(page.links[49], "L49");
        assert_eq!(page.categories.len(), MAX_CATEGORIES);
        assert_eq!(page.sections.len(), MAX_SECTIONS);
        assert_eq!(page.images.len(), MAX_IMAGES);
        assert_eq!(page.references.len(), MAX_REFERENCES);
        assert_eq!(page.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_with_body_counts_full_text() {
        let body = "one two  three\nfour";
        let page = PageMetadata::with_body("u".into(), "s".into(), body);
        assert_eq!(page.word_count, 4);
        assert_eq!(page.content_length, body.chars().count());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
