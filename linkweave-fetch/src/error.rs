use thiserror::Error;

/// Failure to retrieve one topic. Every variant is recoverable: callers skip
/// the topic and carry on.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("page not found: {0}")]
    NotFound(String),

    #[error("\"{title}\" may refer to: {}", .options.join(", "))]
    Ambiguous { title: String, options: Vec<String> },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    NotFound,
    Ambiguous,
    Other,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NotFound(_) => FetchErrorKind::NotFound,
            FetchError::Ambiguous { .. } => FetchErrorKind::Ambiguous,
            FetchError::Other(_) => FetchErrorKind::Other,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Other(format!("HTTP request failed: {}", e))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Other(format!("Parse error: {}", e))
    }
}

impl From<url::ParseError> for FetchError {
    fn from(e: url::ParseError) -> Self {
        FetchError::Other(format!("Invalid URL: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(FetchError::NotFound("X".into()).kind(), FetchErrorKind::NotFound);
        assert_eq!(
            FetchError::Ambiguous { title: "X".into(), options: vec![] }.kind(),
            FetchErrorKind::Ambiguous
        );
        assert_eq!(FetchError::Other("boom".into()).kind(), FetchErrorKind::Other);
    }

    #[test]
    fn test_ambiguous_message_lists_options() {
        let err = FetchError::Ambiguous {
            title: "Mercury".into(),
            options: vec!["Mercury (planet)".into(), "Mercury (element)".into()],
        };
        assert_eq!(
            err.to_string(),
            "\"Mercury\" may refer to: Mercury (planet), Mercury (element)"
        );
    }
}
