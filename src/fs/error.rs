use thiserror::Error;

use crate::fs::node::FileType;
use crate::tree::TreeError;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("cannot remove the root path (`/`) from the file tree")]
    RemovingRoot,

    #[error("cycle detected during symlink resolution at {path}")]
    LinkCycleDetected { path: String },

    #[error("path {path} already exists as a {actual}, not a {expected}")]
    KindMismatch {
        path: String,
        expected: FileType,
        actual: FileType,
    },

    #[error("missing parent {parent} while inserting {child}")]
    MissingParent { parent: String, child: String },

    #[error("no glob pattern given")]
    NoGlobPattern,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid glob pattern: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("merge failed at {path}: {source}")]
    Merge {
        path: String,
        #[source]
        source: Box<FsError>,
    },
}

impl FsError {
    /// Annotate an error with the upper-tree path that the merge engine was
    /// processing when it occurred.
    pub(crate) fn merge_at(path: &str, source: FsError) -> Self {
        FsError::Merge {
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}
