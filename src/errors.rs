/// Domain-specific error types for ranklab
///
/// Every fallible library operation returns `RankError`. Format, configuration and
/// I/O errors are fatal for the file or run that produced them; unsupported
/// combinators surface only when the offending node is scored.

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("Format error in {source_name} at line {line}: {message}")]
    Format {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The {model} retrieval model doesn't support the {operator} operator")]
    UnsupportedCombinator {
        operator: &'static str,
        model: &'static str,
    },

    #[error("Query error: {0}")]
    Query(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Index error: {0}")]
    Index(String),

    #[error("Ranker error: {0}")]
    Ranker(String),
}

impl RankError {
    /// Helper to create format errors tied to a named input and 1-based line
    ///
    /// Example:
    /// ```
    /// use ranklab::errors::RankError;
    /// let err = RankError::format("queries.txt", 3, "Missing ':' in query line");
    /// assert!(err.to_string().contains("line 3"));
    /// ```
    pub fn format(source_name: &str, line: usize, message: &str) -> Self {
        RankError::Format {
            source_name: source_name.to_string(),
            line,
            message: message.to_string(),
        }
    }

    /// Wrap an I/O failure with the path it happened on.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        RankError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<figment::Error> for RankError {
    fn from(e: figment::Error) -> Self {
        RankError::Config(format!("Failed to load config: {}", e))
    }
}
