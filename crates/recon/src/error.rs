use std::fmt;

/// Run-level failure. Only these abort a run; everything scoped to a single
/// group is recorded as a change event instead.
#[derive(Debug)]
pub enum SyncError {
    /// A required column is absent from the input header.
    MissingColumn { column: String },
    /// CSV read / decode error.
    Csv(String),
    /// Config parse / deserialization error.
    ConfigParse(String),
    /// Config validation error.
    ConfigValidation(String),
    /// Directory failure while building the run-wide indexes.
    Directory(DirectoryError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { column } => write!(f, "header '{column}' could not be found"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Directory(e) => write!(f, "directory error: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<DirectoryError> for SyncError {
    fn from(e: DirectoryError) -> Self {
        Self::Directory(e)
    }
}

/// Error reported by a [`crate::directory::Directory`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No usable credentials, or the directory rejected them.
    NotAuthenticated(String),
    /// Transport-level failure.
    Network(String),
    /// Non-success HTTP status.
    Http(u16, String),
    /// Response body could not be decoded.
    Parse(String),
    /// Request rejected as invalid (400/422).
    Validation(String),
    /// Referenced object does not exist.
    NotFound(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated(msg) => write!(f, "not authenticated: {msg}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http(code, msg) => write!(f, "HTTP {code}: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Name -> identifier resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NameNotFound { name: String, entity_type: String },
    AmbiguousName { name: String, entity_type: String, matches: usize },
    GroupNotFound { name: String },
    AmbiguousGroupName { name: String, matches: usize },
    Directory(DirectoryError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameNotFound { name, entity_type } => {
                write!(f, "unable to find uuid for {entity_type} {name}")
            }
            Self::AmbiguousName { name, entity_type, matches } => {
                write!(f, "multiple {entity_type} with the name {name} ({matches} matches)")
            }
            Self::GroupNotFound { name } => write!(f, "no group found matching name '{name}'"),
            Self::AmbiguousGroupName { name, matches } => {
                write!(f, "found multiple groups matching name {name} ({matches} matches)")
            }
            Self::Directory(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<DirectoryError> for ResolveError {
    fn from(e: DirectoryError) -> Self {
        Self::Directory(e)
    }
}

/// Failure of an operation on a single static group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// Create attempted while a group with the same name exists.
    AlreadyExists { name: String, identifier: String },
    /// Operation requires a resolved identifier and none is held.
    MissingIdentifier { name: String },
    Resolve(ResolveError),
    Directory(DirectoryError),
}

impl fmt::Display for GroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists { name, identifier } => {
                write!(f, "group with name '{name}' already exists with uuid {identifier}")
            }
            Self::MissingIdentifier { name } => {
                write!(f, "group '{name}' has no resolved uuid")
            }
            Self::Resolve(e) => write!(f, "{e}"),
            Self::Directory(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GroupError {}

impl From<ResolveError> for GroupError {
    fn from(e: ResolveError) -> Self {
        Self::Resolve(e)
    }
}

impl From<DirectoryError> for GroupError {
    fn from(e: DirectoryError) -> Self {
        Self::Directory(e)
    }
}
