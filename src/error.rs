/// Fatal configuration problems, reported once before any record is accepted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Do not put [{0}] in default_keep_fields or extra_keep_fields")]
    UndefinedNameInKeepFields(String),

    #[error("Field [{0}] must be listed in default_keep_fields or extra_keep_fields")]
    SourceTimeNotKept(String),

    #[error("Invalid tag pattern {pattern:?}: {reason}")]
    InvalidTagPattern { pattern: String, reason: String },

    #[error("Cannot read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Per-line failures of the stream driver. The record transform itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Invalid event at line {line}: {message}")]
    InvalidEvent { line: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Line too long: {length} > {max_length}")]
    LineTooLong { length: usize, max_length: usize },
}
