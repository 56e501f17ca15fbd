// Error taxonomy for the project core

use crate::codec::FormatError;

/// Kind of uid that failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Item,
    Track,
    Plugin,
    Sample,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Item => write!(f, "item"),
            ReferenceKind::Track => write!(f, "track"),
            ReferenceKind::Plugin => write!(f, "plugin"),
            ReferenceKind::Sample => write!(f, "wav pool entry"),
        }
    }
}

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// A decoded file violates its encoding contract; fatal for that file
    #[error("format error in {file}: {source}")]
    Format {
        file: String,
        #[source]
        source: FormatError,
    },

    /// A uid does not resolve; callers drop the dangling reference
    #[error("unknown {kind} uid {uid}")]
    Reference { kind: ReferenceKind, uid: u32 },

    /// A fixed-size table is full
    #[error("capacity exceeded: no free {what} (limit {limit})")]
    Capacity { what: &'static str, limit: usize },

    /// A routing change was rejected
    #[error("routing rejected: {0}")]
    Routing(String),

    /// Caller supplied a malformed value
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// History journal could not be read or written
    #[error("history journal error: {0}")]
    Journal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProjectError {
    pub fn format(file: impl Into<String>, source: FormatError) -> Self {
        ProjectError::Format {
            file: file.into(),
            source,
        }
    }

    pub fn reference(kind: ReferenceKind, uid: u32) -> Self {
        ProjectError::Reference { kind, uid }
    }

    pub fn capacity(what: &'static str, limit: usize) -> Self {
        ProjectError::Capacity { what, limit }
    }

    /// Whether the caller can recover by dropping the offending reference
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ProjectError::Format { .. } | ProjectError::Io(_))
    }
}

impl From<FormatError> for ProjectError {
    fn from(source: FormatError) -> Self {
        ProjectError::format("<memory>", source)
    }
}

/// Result type for project operations
pub type ProjectResult<T> = Result<T, ProjectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ProjectError::capacity("send slot", 4);
        assert_eq!(err.to_string(), "capacity exceeded: no free send slot (limit 4)");

        let err = ProjectError::reference(ReferenceKind::Item, 7);
        assert_eq!(err.to_string(), "unknown item uid 7");
        assert!(err.is_recoverable());

        let err = ProjectError::format("sequencer.txt", FormatError::new(3, "bad"));
        assert_eq!(err.to_string(), "format error in sequencer.txt: line 3: bad");
        assert!(!err.is_recoverable());
    }
}
