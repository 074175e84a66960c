use crate::fs::error::FsResult;
use crate::fs::filetree::FileTree;
use crate::fs::node::{FileNode, FileType};
use crate::fs::path::{base_name, join};
use crate::fs::resolver::{LinkOptions, LinkResolutionStrategy};
use crate::tree::TreeNode;

/// A directory entry as seen through the resolver: the name under the
/// caller's view of the directory, and the kind the entry resolves to
/// (dead links keep their link kind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
}

/// Read-only filesystem view over a [`FileTree`] for external matchers.
///
/// Listings and stats route through the resolver with ancestor-link
/// following enabled, so a pattern matcher driving this view observes the
/// same reachability `FileTree::file` would.
pub struct TreeView<'t> {
    tree: &'t FileTree,
}

impl<'t> TreeView<'t> {
    pub fn new(tree: &'t FileTree) -> Self {
        Self { tree }
    }

    /// Resolve `virtual_path` with ancestor links followed and the basename
    /// handled per `options`.
    pub fn stat(&self, virtual_path: &str, options: LinkOptions) -> FsResult<Option<FileNode>> {
        let (_, node) = self.tree.resolve_node(
            virtual_path,
            LinkResolutionStrategy {
                follow_ancestor_links: true,
                follow_basename_links: options.follow_basename_links,
                do_not_follow_dead_basename_links: options.do_not_follow_dead_basename_links,
            },
        )?;
        Ok(node)
    }

    /// List the entries of `virtual_dir` as the resolver sees them. Absent
    /// paths and non-directories list as empty.
    pub fn read_dir(&self, virtual_dir: &str) -> FsResult<Vec<DirEntry>> {
        let Some(dir_node) = self.stat(virtual_dir, LinkOptions::follow_basename())? else {
            return Ok(Vec::new());
        };
        if dir_node.file_type != FileType::Directory {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for child in self.tree.tree.children(dir_node.id()) {
            let (base_path, _) = self.tree.resolve_node(
                &child.real_path,
                LinkResolutionStrategy {
                    follow_ancestor_links: true,
                    ..Default::default()
                },
            )?;
            let name = base_name(&base_path).to_string();

            // dead links keep their link kind so callers can tell them from
            // resolvable entries
            let virtual_path = join(virtual_dir, &name);
            let Some(resolved) = self.stat(&virtual_path, LinkOptions::follow_basename_keep_dead())?
            else {
                continue;
            };
            entries.push(DirEntry {
                name,
                file_type: resolved.file_type,
            });
        }
        Ok(entries)
    }
}
