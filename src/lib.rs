//! In-memory model of a container-image layer's directory tree.
//!
//! A [`FileTree`] indexes files, directories, symlinks, and hard links by
//! their real (canonical) path, tolerating out-of-order ingestion where
//! ancestors arrive late or never. Lookups resolve symlinks with a
//! configurable follow strategy, and [`FileTree::merge`] applies one layer
//! onto another honoring overlay-filesystem whiteout and opaque-directory
//! markers, which is the basis of squashing an image.

pub mod fs;
pub mod tree;

pub use fs::error::{FsError, FsResult};
pub use fs::filetree::FileTree;
pub use fs::glob::GlobResult;
pub use fs::node::{FileNode, FileReference, FileType};
pub use fs::resolver::LinkOptions;
