use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::TreeNode;

/// The kind of entry a tree position holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Directory,
    RegularFile,
    Symlink,
    HardLink,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Directory => "directory",
            FileType::RegularFile => "regular file",
            FileType::Symlink => "symlink",
            FileType::HardLink => "hard link",
        };
        f.write_str(name)
    }
}

/// Opaque handle tying a tree position to externally stored content
/// metadata. The tree only ever checks for its presence; it never
/// interprets the identity it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub id: Uuid,
    pub real_path: String,
}

impl FileReference {
    pub fn new(real_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            real_path: real_path.into(),
        }
    }
}

/// The record stored at each tree position.
///
/// `real_path` is the node's identity: normalized, absolute, and
/// link-free in its constituent segments. A node without a reference is an
/// implicit ancestor, materialized only to host descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub real_path: String,
    pub file_type: FileType,
    pub link_target: Option<String>,
    pub reference: Option<FileReference>,
}

impl FileNode {
    pub fn new_dir(real_path: impl Into<String>, reference: Option<FileReference>) -> Self {
        Self {
            real_path: real_path.into(),
            file_type: FileType::Directory,
            link_target: None,
            reference,
        }
    }

    pub fn new_file(real_path: impl Into<String>, reference: Option<FileReference>) -> Self {
        Self {
            real_path: real_path.into(),
            file_type: FileType::RegularFile,
            link_target: None,
            reference,
        }
    }

    pub fn new_symlink(
        real_path: impl Into<String>,
        link_target: impl Into<String>,
        reference: Option<FileReference>,
    ) -> Self {
        Self {
            real_path: real_path.into(),
            file_type: FileType::Symlink,
            link_target: Some(link_target.into()),
            reference,
        }
    }

    pub fn new_hard_link(
        real_path: impl Into<String>,
        link_target: impl Into<String>,
        reference: Option<FileReference>,
    ) -> Self {
        Self {
            real_path: real_path.into(),
            file_type: FileType::HardLink,
            link_target: Some(link_target.into()),
            reference,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self.file_type, FileType::Symlink | FileType::HardLink)
    }
}

impl TreeNode for FileNode {
    fn id(&self) -> &str {
        &self.real_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_display() {
        assert_eq!(FileType::Directory.to_string(), "directory");
        assert_eq!(FileType::RegularFile.to_string(), "regular file");
        assert_eq!(FileType::Symlink.to_string(), "symlink");
        assert_eq!(FileType::HardLink.to_string(), "hard link");
    }

    #[test]
    fn test_reference_factory_yields_distinct_handles() {
        let a = FileReference::new("/same");
        let b = FileReference::new("/same");
        assert_ne!(a.id, b.id);
        assert_eq!(a.real_path, b.real_path);
    }

    #[test]
    fn test_is_link() {
        assert!(FileNode::new_symlink("/l", "/t", None).is_link());
        assert!(FileNode::new_hard_link("/h", "/t", None).is_link());
        assert!(!FileNode::new_dir("/d", None).is_link());
        assert!(!FileNode::new_file("/f", None).is_link());
    }

    #[test]
    fn test_link_target_presence_matches_kind() {
        assert!(FileNode::new_symlink("/l", "../t", None).link_target.is_some());
        assert!(FileNode::new_dir("/d", None).link_target.is_none());
        assert!(FileNode::new_file("/f", None).link_target.is_none());
    }

    #[test]
    fn test_node_id_is_real_path() {
        let node = FileNode::new_file("/a/b", None);
        assert_eq!(node.id(), "/a/b");
    }
}
