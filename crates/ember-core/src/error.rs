use std::fmt;

/// Machine-readable error codes for operator and agent decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    IncidentNotFound,
    InvalidInput,
    InvalidFilterCombination,
    IndexOutOfRange,
    Forbidden,
    DuplicateEntry,
    IncidentNotActive,
    TransactionFailed,
    StoreFailure,
    CorruptData,
    CollaboratorFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::IncidentNotFound => "E2001",
            Self::InvalidInput => "E2002",
            Self::InvalidFilterCombination => "E2003",
            Self::IndexOutOfRange => "E2004",
            Self::Forbidden => "E2005",
            Self::DuplicateEntry => "E2006",
            Self::IncidentNotActive => "E2007",
            Self::TransactionFailed => "E5001",
            Self::StoreFailure => "E5002",
            Self::CorruptData => "E5003",
            Self::CollaboratorFailure => "E6001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::IncidentNotFound => "Not found",
            Self::InvalidInput => "Invalid input",
            Self::InvalidFilterCombination => "Invalid filter combination",
            Self::IndexOutOfRange => "Checklist index out of range",
            Self::Forbidden => "Not authorized",
            Self::DuplicateEntry => "Duplicate entry",
            Self::IncidentNotActive => "Incident is not active",
            Self::TransactionFailed => "Store transaction failed",
            Self::StoreFailure => "Store query failed",
            Self::CorruptData => "Corrupt stored data",
            Self::CollaboratorFailure => "External collaborator failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `em init` to create the incident store."),
            Self::ConfigParseError => Some("Fix syntax in .ember/config.toml and retry."),
            Self::IncidentNotFound | Self::InvalidInput => None,
            Self::InvalidFilterCombination => {
                Some("Pass either a single status or a status list, not both.")
            }
            Self::IndexOutOfRange => Some("Run `em show <id>` to list checklist positions."),
            Self::Forbidden => Some("Join the incident channel or ask an admin for access."),
            Self::DuplicateEntry => Some("Each channel can host only one incident."),
            Self::IncidentNotActive => {
                Some("Archived incidents are final; start a new incident instead.")
            }
            Self::TransactionFailed => Some("Retry after other writers release the store."),
            Self::StoreFailure => Some("Check the database path and disk permissions."),
            Self::CorruptData => Some("Inspect the incident row; checklists JSON failed to decode."),
            Self::CollaboratorFailure => Some("Check the directory/poster backing store."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by the incident engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid filter combination: {0}")]
    InvalidFilterCombination(String),

    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("incident '{0}' is archived and accepts no further status updates")]
    IncidentNotActive(String),

    #[error("could not {stage} transaction")]
    TransactionFailure {
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{context}")]
    Store {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to decode {what}")]
    CorruptData {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{what} failed")]
    Collaborator {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::IncidentNotFound,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::InvalidFilterCombination(_) => ErrorCode::InvalidFilterCombination,
            Self::OutOfRange { .. } => ErrorCode::IndexOutOfRange,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::DuplicateEntry(_) => ErrorCode::DuplicateEntry,
            Self::IncidentNotActive(_) => ErrorCode::IncidentNotActive,
            Self::TransactionFailure { .. } => ErrorCode::TransactionFailed,
            Self::Store { .. } => ErrorCode::StoreFailure,
            Self::CorruptData { .. } => ErrorCode::CorruptData,
            Self::Collaborator { .. } => ErrorCode::CollaboratorFailure,
            Self::Config(_) => ErrorCode::ConfigParseError,
        }
    }

    /// HTTP-equivalent status class for the outer request layer.
    #[must_use]
    pub const fn status_class(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::InvalidInput(_) | Self::InvalidFilterCombination(_) | Self::OutOfRange { .. } => {
                400
            }
            _ => 500,
        }
    }
}

/// Translate raw `rusqlite` failures into [`Error`] at the store boundary.
///
/// Unique and primary-key violations become [`Error::DuplicateEntry`] so
/// callers never need to inspect driver error codes.
pub(crate) trait StoreResultExt<T> {
    fn store(self, context: &str) -> Result<T>;

    fn with_store<F: FnOnce() -> String>(self, context: F) -> Result<T>;
}

impl<T> StoreResultExt<T> for rusqlite::Result<T> {
    fn store(self, context: &str) -> Result<T> {
        self.with_store(|| context.to_string())
    }

    fn with_store<F: FnOnce() -> String>(self, context: F) -> Result<T> {
        self.map_err(|source| {
            if is_unique_violation(&source) {
                Error::DuplicateEntry(context())
            } else {
                Error::Store {
                    context: context(),
                    source,
                }
            }
        })
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode, StoreResultExt};
    use rusqlite::Connection;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::IncidentNotFound,
            ErrorCode::InvalidInput,
            ErrorCode::InvalidFilterCombination,
            ErrorCode::IndexOutOfRange,
            ErrorCode::Forbidden,
            ErrorCode::DuplicateEntry,
            ErrorCode::IncidentNotActive,
            ErrorCode::TransactionFailed,
            ErrorCode::StoreFailure,
            ErrorCode::CorruptData,
            ErrorCode::CollaboratorFailure,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::IncidentNotActive.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn status_classes_follow_request_layer_mapping() {
        assert_eq!(Error::not_found("incident", "x").status_class(), 404);
        assert_eq!(Error::Forbidden("nope".into()).status_class(), 403);
        assert_eq!(Error::InvalidInput("bad".into()).status_class(), 400);
        let oob = Error::OutOfRange {
            what: "checklist",
            index: 3,
            len: 1,
        };
        assert_eq!(oob.status_class(), 400);
        assert_eq!(Error::IncidentNotActive("x".into()).status_class(), 500);
        assert_eq!(Error::DuplicateEntry("x".into()).status_class(), 500);
    }

    #[test]
    fn unique_violation_maps_to_duplicate_entry() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .expect("setup");
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .store("insert t")
            .expect_err("duplicate must fail");
        assert!(matches!(err, Error::DuplicateEntry(ref ctx) if ctx == "insert t"));
        assert_eq!(err.code(), ErrorCode::DuplicateEntry);
    }

    #[test]
    fn other_sqlite_errors_keep_context() {
        let conn = Connection::open_in_memory().expect("open");
        let err = conn
            .execute("INSERT INTO missing VALUES (1)", [])
            .store("insert missing")
            .expect_err("must fail");
        assert!(matches!(err, Error::Store { ref context, .. } if context == "insert missing"));
    }
}
