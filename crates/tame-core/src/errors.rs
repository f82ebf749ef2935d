//! Error types for the tame core library.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::LinkRule;

/// Coarse classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ErrorKind {
    ParseError,
    SchemaError,
    DuplicateUidError,
    UnresolvedLinkError,
    AmbiguousLinkError,
    CycleError,
    #[serde(rename = "IOError")]
    IoError,
    ConfigError,
    QueryError,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::SchemaError => "SchemaError",
            ErrorKind::DuplicateUidError => "DuplicateUidError",
            ErrorKind::UnresolvedLinkError => "UnresolvedLinkError",
            ErrorKind::AmbiguousLinkError => "AmbiguousLinkError",
            ErrorKind::CycleError => "CycleError",
            ErrorKind::IoError => "IOError",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::QueryError => "QueryError",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// Top-level error enum for the tame core library.
#[derive(Debug, thiserror::Error)]
pub enum TameError {
    #[error("invalid YAML in {}{}: {message}", path.display(), location_suffix(*line, *column))]
    Parse {
        path: PathBuf,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
        /// Offending source line with a caret under the error column.
        excerpt: Option<String>,
    },

    #[error("schema error in {}: {message}", path.display())]
    Schema { path: PathBuf, message: String },

    #[error(
        "metadata with type={doc_type}, uid={uid} is not unique: {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateUid {
        doc_type: String,
        uid: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(
        "parent #{position} of {} ({rule}): no metadata found for {target}",
        document.display()
    )]
    UnresolvedLink {
        document: PathBuf,
        position: usize,
        rule: LinkRule,
        target: String,
    },

    #[error(
        "parent #{position} of {} ({rule}): {target} matches multiple metadata objects: {}",
        document.display(),
        join_paths(candidates, ", ")
    )]
    AmbiguousLink {
        document: PathBuf,
        position: usize,
        rule: LinkRule,
        target: String,
        candidates: Vec<PathBuf>,
    },

    #[error("parent cycle: {}", join_paths(cycle, " -> "))]
    Cycle { cycle: Vec<PathBuf> },

    #[error(
        "tracked file {} of {} does not exist",
        file.display(),
        document.display()
    )]
    MissingFile { document: PathBuf, file: PathBuf },

    #[error(
        "output collision at {}: {} and {} have different contents",
        destination.display(),
        first.display(),
        second.display()
    )]
    OutputCollision {
        destination: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("refusing to collect into {}: {message}", destination.display())]
    UnsafeDestination { destination: PathBuf, message: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no root 'tame.yaml' file found at or above {}", start.display())]
    UntrackedRepository { start: PathBuf },

    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("no metadata document is loaded from {}", path.display())]
    UnknownDocument { path: PathBuf },

    #[error("invalid search term '{term}': {message}")]
    InvalidQuery { term: String, message: String },

    #[error("run cancelled before completion")]
    Cancelled,
}

impl TameError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TameError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn schema(path: &Path, message: impl Into<String>) -> Self {
        TameError::Schema {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TameError::Parse { .. } => ErrorKind::ParseError,
            TameError::Schema { .. } => ErrorKind::SchemaError,
            TameError::DuplicateUid { .. } => ErrorKind::DuplicateUidError,
            TameError::UnresolvedLink { .. } => ErrorKind::UnresolvedLinkError,
            TameError::AmbiguousLink { .. } => ErrorKind::AmbiguousLinkError,
            TameError::Cycle { .. } => ErrorKind::CycleError,
            TameError::MissingFile { .. }
            | TameError::OutputCollision { .. }
            | TameError::UnsafeDestination { .. }
            | TameError::Io { .. }
            | TameError::UnknownDocument { .. } => ErrorKind::IoError,
            TameError::UntrackedRepository { .. } | TameError::Config { .. } => {
                ErrorKind::ConfigError
            }
            TameError::InvalidQuery { .. } => ErrorKind::QueryError,
            TameError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The document the error is attributed to, if any.
    pub fn document(&self) -> Option<&Path> {
        match self {
            TameError::Parse { path, .. }
            | TameError::Schema { path, .. }
            | TameError::Config { path, .. }
            | TameError::UnknownDocument { path } => Some(path),
            TameError::DuplicateUid { second, .. } => Some(second),
            TameError::UnresolvedLink { document, .. }
            | TameError::AmbiguousLink { document, .. }
            | TameError::MissingFile { document, .. } => Some(document),
            TameError::Cycle { cycle } => cycle.first().map(PathBuf::as_path),
            TameError::OutputCollision { second, .. } => Some(second),
            TameError::Io { path, .. } => Some(path),
            TameError::UnsafeDestination { destination, .. } => Some(destination),
            TameError::UntrackedRepository { start } => Some(start),
            TameError::InvalidQuery { .. } | TameError::Cancelled => None,
        }
    }

    /// Owned copy of the error. IO sources keep their kind and message.
    pub fn replicate(&self) -> TameError {
        match self {
            TameError::Parse {
                path,
                line,
                column,
                message,
                excerpt,
            } => TameError::Parse {
                path: path.clone(),
                line: *line,
                column: *column,
                message: message.clone(),
                excerpt: excerpt.clone(),
            },
            TameError::Schema { path, message } => TameError::Schema {
                path: path.clone(),
                message: message.clone(),
            },
            TameError::DuplicateUid {
                doc_type,
                uid,
                first,
                second,
            } => TameError::DuplicateUid {
                doc_type: doc_type.clone(),
                uid: uid.clone(),
                first: first.clone(),
                second: second.clone(),
            },
            TameError::UnresolvedLink {
                document,
                position,
                rule,
                target,
            } => TameError::UnresolvedLink {
                document: document.clone(),
                position: *position,
                rule: *rule,
                target: target.clone(),
            },
            TameError::AmbiguousLink {
                document,
                position,
                rule,
                target,
                candidates,
            } => TameError::AmbiguousLink {
                document: document.clone(),
                position: *position,
                rule: *rule,
                target: target.clone(),
                candidates: candidates.clone(),
            },
            TameError::Cycle { cycle } => TameError::Cycle {
                cycle: cycle.clone(),
            },
            TameError::MissingFile { document, file } => TameError::MissingFile {
                document: document.clone(),
                file: file.clone(),
            },
            TameError::OutputCollision {
                destination,
                first,
                second,
            } => TameError::OutputCollision {
                destination: destination.clone(),
                first: first.clone(),
                second: second.clone(),
            },
            TameError::UnsafeDestination {
                destination,
                message,
            } => TameError::UnsafeDestination {
                destination: destination.clone(),
                message: message.clone(),
            },
            TameError::Io { path, source } => TameError::Io {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            TameError::UntrackedRepository { start } => TameError::UntrackedRepository {
                start: start.clone(),
            },
            TameError::Config { path, message } => TameError::Config {
                path: path.clone(),
                message: message.clone(),
            },
            TameError::UnknownDocument { path } => TameError::UnknownDocument { path: path.clone() },
            TameError::InvalidQuery { term, message } => TameError::InvalidQuery {
                term: term.clone(),
                message: message.clone(),
            },
            TameError::Cancelled => TameError::Cancelled,
        }
    }

    /// Source excerpt of a parse error, ready to print below the message.
    pub fn excerpt(&self) -> Option<&str> {
        match self {
            TameError::Parse { excerpt, .. } => excerpt.as_deref(),
            _ => None,
        }
    }

    /// Position of the offending entry in the document's `parent` list.
    pub fn link_position(&self) -> Option<usize> {
        match self {
            TameError::UnresolvedLink { position, .. }
            | TameError::AmbiguousLink { position, .. } => Some(*position),
            _ => None,
        }
    }
}

fn location_suffix(line: Option<usize>, column: Option<usize>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!(" (line {l}, column {c})"),
        (Some(l), None) => format!(" (line {l})"),
        _ => String::new(),
    }
}

fn join_paths(paths: &[PathBuf], separator: &str) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

pub type TameResult<T> = Result<T, TameError>;

// ---------------------------------------------------------------------------
// Report-level projection
// ---------------------------------------------------------------------------

/// A single entry in a validation report.
///
/// Ordering is kind, then document, then link position, then message, which
/// keeps reports byte-identical between runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Violation {
    pub kind: ErrorKind,
    pub document: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl From<&TameError> for Violation {
    fn from(err: &TameError) -> Self {
        Violation {
            kind: err.kind(),
            document: err.document().map(Path::to_path_buf),
            position: err.link_position(),
            message: err.to_string(),
            excerpt: err.excerpt().map(str::to_string),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
