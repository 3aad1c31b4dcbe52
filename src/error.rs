use std::fmt;
use thiserror::Error;

/// Main error type for Docstringer
#[derive(Error, Debug)]
pub enum DocstringerError {
    /// Configuration errors (fatal: bad root path, missing credential)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generation request exceeded the per-request timeout
    #[error("Generation timed out after {0}s")]
    GenerationTimeout(u64),

    /// Generation service returned an error response
    #[error("Generation service error {status}: {message}")]
    GenerationService { status: u16, message: String },

    /// Authentication or billing failure
    #[error("Generation quota/authentication error: {0}")]
    GenerationQuota(String),

    /// Response could not be turned into a docstring
    #[error("Generation format error: {0}")]
    GenerationFormat(String),

    /// Edit offsets no longer match the file; the write is aborted
    #[error("Patch consistency error: {0}")]
    PatchConsistency(String),
}

impl DocstringerError {
    /// Classify the error for the run summary
    pub fn kind(&self) -> FailureKind {
        match self {
            DocstringerError::Config(_) => FailureKind::Configuration,
            DocstringerError::Io(_) => FailureKind::Io,
            DocstringerError::Parse(_) => FailureKind::Parse,
            DocstringerError::GenerationTimeout(_) => FailureKind::GenerationTimeout,
            DocstringerError::GenerationService { .. } => FailureKind::GenerationService,
            DocstringerError::GenerationQuota(_) => FailureKind::GenerationQuota,
            DocstringerError::GenerationFormat(_) => FailureKind::GenerationFormat,
            DocstringerError::PatchConsistency(_) => FailureKind::PatchConsistency,
        }
    }

    /// Whether this error only costs a single candidate. Any other error during
    /// generation abandons the file.
    pub fn is_candidate_local(&self) -> bool {
        matches!(
            self,
            DocstringerError::GenerationTimeout(_)
                | DocstringerError::GenerationService { .. }
                | DocstringerError::GenerationQuota(_)
                | DocstringerError::GenerationFormat(_)
        )
    }
}

/// Failure categories reported in the final summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    Configuration,
    Io,
    Parse,
    GenerationTimeout,
    GenerationService,
    GenerationQuota,
    GenerationFormat,
    PatchConsistency,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Configuration => "ConfigurationError",
            FailureKind::Io => "IoError",
            FailureKind::Parse => "ParseError",
            FailureKind::GenerationTimeout => "GenerationTimeout",
            FailureKind::GenerationService => "GenerationServiceError",
            FailureKind::GenerationQuota => "GenerationQuotaError",
            FailureKind::GenerationFormat => "GenerationFormatError",
            FailureKind::PatchConsistency => "PatchConsistencyError",
        };
        f.write_str(name)
    }
}

/// Convenient Result type using DocstringerError
pub type Result<T> = std::result::Result<T, DocstringerError>;
