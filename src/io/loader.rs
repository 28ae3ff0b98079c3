use std::path::PathBuf;

use crate::model::task::TaskNode;

/// Error type for loading task lists
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not serialize vault: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Resolves identifiers into fresh task subtrees.
///
/// The loader is the authoritative source of children during drill-down;
/// the in-memory `children` of a node are never trusted for that.
pub trait Loader {
    /// The list shown for `id`: a note's children, or the result of a query
    fn load(&self, id: &str) -> Result<Vec<TaskNode>, LoadError>;

    /// The listed tasks themselves, in order. Unknown ids are skipped.
    fn load_specific_files(&self, ids: &[String]) -> Result<Vec<TaskNode>, LoadError>;
}
