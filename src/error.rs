use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for metadata declaration and document generation
#[derive(Debug, Error)]
pub enum Error {
    /// A value that must be a tree (e.g. a parameter map) was something else
    #[error("Expected {0} in the form of a tree")]
    MergeType(String),

    /// A `responses` key is not a decimal HTTP status code
    #[error("Invalid response code {0}")]
    InvalidResponseCode(String),

    /// A lookup or declaration discriminator is neither a valid name nor a pattern
    #[error("Valid {0} argument required")]
    InvalidArgument(&'static str),

    /// A declaration received non-tree metadata for a tree-only category
    #[error("Expected tree argument for {0}")]
    ExpectedTreeArgument(&'static str),

    /// The definitions collector handed to the schema resolver is not a tree
    #[error("Expected tree for definitions")]
    ExpectedTreeDefinitions,

    /// A by-name lookup callback returned something other than a tree or nothing
    #[error("Expected tree result from {kind} resolver for '{name}'")]
    ExpectedTreeFromResolver { kind: &'static str, name: String },

    /// A tag definition callback returned something other than a tree or nothing
    #[error("Expected tree result from tag definer for '{0}'")]
    ExpectedTreeFromDefiner(String),

    /// No base paths were configured or passed
    #[error(
        "Missing API base paths; must be passed as an option or configured under 'base_paths'"
    )]
    MissingBasePaths,

    /// The `base_paths` setting has an unusable shape
    #[error("Invalid value for 'base_paths': {0}")]
    InvalidBasePaths(String),

    /// Writing was requested but no destination is known
    #[error(
        "Missing output file path; must be passed explicitly or configured under 'output_file_path'"
    )]
    MissingOutputTarget,

    /// A path or filter pattern failed to compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Broad classes of failure, used to decide how far an error propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad shape for a declared metadata argument; fails at declaration time
    Configuration,
    /// A merge strategy met a value it cannot reconcile
    MergeConflict,
    /// A reference did not resolve to a tree
    Resolution,
    /// No output destination
    OutputTarget,
    /// Filesystem or serialization failure
    Io,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidArgument(_)
            | Error::ExpectedTreeArgument(_)
            | Error::MissingBasePaths
            | Error::InvalidBasePaths(_)
            | Error::InvalidPattern { .. } => ErrorCategory::Configuration,
            Error::MergeType(_) | Error::InvalidResponseCode(_) => ErrorCategory::MergeConflict,
            Error::ExpectedTreeDefinitions
            | Error::ExpectedTreeFromResolver { .. }
            | Error::ExpectedTreeFromDefiner(_) => ErrorCategory::Resolution,
            Error::MissingOutputTarget => ErrorCategory::OutputTarget,
            Error::Io { .. } | Error::Serialization(_) => ErrorCategory::Io,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML serialization error: {}", err))
    }
}
