/// Case-insensitive keyword predicate deciding whether a topic is in-domain.
#[derive(Debug, Clone, Default)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
}

impl RelevanceFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        Self { keywords }
    }

    /// True when any keyword occurs in the title or the optional text. An empty
    /// keyword set accepts nothing.
    pub fn is_relevant(&self, title: &str, text: Option<&str>) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let haystack = match text {
            Some(text) => format!("{} {}", title, text).to_lowercase(),
            None => title.to_lowercase(),
        };
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Reference titles that name navigation pages rather than content: lists,
/// categories, files and templates.
pub fn is_structural_reference(title: &str) -> bool {
    const PATTERNS: [&str; 4] = ["list of", "category:", "file:", "template:"];
    let lower = title.to_lowercase();
    PATTERNS.iter().any(|p| lower.contains(p))
}
