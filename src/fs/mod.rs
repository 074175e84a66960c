pub mod error;
pub mod filetree;
pub mod glob;
pub mod node;
pub mod path;
pub mod resolver;
pub mod view;

pub use error::{FsError, FsResult};
pub use filetree::FileTree;
pub use glob::GlobResult;
pub use node::{FileNode, FileReference, FileType};
pub use resolver::LinkOptions;
pub use view::{DirEntry, TreeView};
