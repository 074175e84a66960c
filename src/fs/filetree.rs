use std::collections::HashSet;

use tracing::{debug, trace};

use crate::fs::error::{FsError, FsResult};
use crate::fs::node::{FileNode, FileReference, FileType};
use crate::fs::path::{
    constituent_paths, is_opaque_whiteout, is_whiteout, join, normalize_path, parent_path,
    un_whiteout_path, OPAQUE_WHITEOUT,
};
use crate::fs::resolver::{LinkOptions, LinkResolutionStrategy};
use crate::tree::{DepthFirstWalker, Tree, TreeNode, WalkConditions};

/// A path-indexed model of one layer (or a squashed image) of a container
/// image filesystem.
///
/// Entries may be inserted in any order; missing ancestors are materialized
/// as implicit directories so that tar ingestion can add children before
/// (or without ever seeing) their parents. All paths handed in are treated
/// as real canonical paths: constituent segments must not be links.
#[derive(Debug, Clone)]
pub struct FileTree {
    pub(crate) tree: Tree<FileNode>,
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTree {
    /// Create a tree holding only the root directory `/`.
    pub fn new() -> Self {
        let mut tree = Tree::new();
        // a fresh tree always accepts a root
        let _ = tree.add_root(FileNode::new_dir("/", None));
        Self { tree }
    }

    /// Fold an ordered sequence of layer trees (lowest first) into a single
    /// squashed tree by merging each subsequent layer onto the first.
    pub fn squash<'a>(layers: impl IntoIterator<Item = &'a FileTree>) -> FsResult<FileTree> {
        let mut iter = layers.into_iter();
        let Some(bottom) = iter.next() else {
            return Ok(FileTree::new());
        };

        let mut squashed = bottom.clone();
        for layer in iter {
            squashed.merge(layer)?;
        }
        Ok(squashed)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    // -- mutation ---------------------------------------------------------

    /// Add a regular file, materializing any missing ancestors. Re-adding
    /// an existing file returns its reference, attaching a fresh one first
    /// if the node had none.
    pub fn add_file(&mut self, real_path: &str) -> FsResult<FileReference> {
        let path = normalize_path(real_path)?;
        debug!(path = %path, "adding regular file");
        self.add_path_node(path, FileType::RegularFile, None)
    }

    /// Add a directory, materializing any missing ancestors.
    pub fn add_dir(&mut self, real_path: &str) -> FsResult<FileReference> {
        let path = normalize_path(real_path)?;
        debug!(path = %path, "adding directory");
        self.add_path_node(path, FileType::Directory, None)
    }

    /// Add a symlink. The target is stored verbatim and may be absolute or
    /// relative; no resolution happens at insert time.
    pub fn add_symlink(&mut self, real_path: &str, link_target: &str) -> FsResult<FileReference> {
        let path = normalize_path(real_path)?;
        debug!(path = %path, target = %link_target, "adding symlink");
        self.add_path_node(path, FileType::Symlink, Some(link_target.to_string()))
    }

    /// Add a hard link. The target is stored verbatim.
    pub fn add_hard_link(&mut self, real_path: &str, link_target: &str) -> FsResult<FileReference> {
        let path = normalize_path(real_path)?;
        debug!(path = %path, target = %link_target, "adding hard link");
        self.add_path_node(path, FileType::HardLink, Some(link_target.to_string()))
    }

    fn add_path_node(
        &mut self,
        path: String,
        file_type: FileType,
        link_target: Option<String>,
    ) -> FsResult<FileReference> {
        if let Some(node) = self.tree.node_mut(&path) {
            if node.file_type != file_type {
                return Err(FsError::KindMismatch {
                    path,
                    expected: file_type,
                    actual: node.file_type,
                });
            }
            let reference = node.reference.get_or_insert_with(|| FileReference::new(&path));
            return Ok(reference.clone());
        }

        self.add_parent_paths(&path)?;

        let reference = FileReference::new(&path);
        self.set_file_node(FileNode {
            real_path: path,
            file_type,
            link_target,
            reference: Some(reference.clone()),
        })?;
        Ok(reference)
    }

    /// Materialize every missing ancestor of `real_path` as an implicit
    /// directory (no reference attached). Probes deepest-first so only the
    /// truly missing suffix of the ancestry is created, then inserts
    /// rootward-first.
    pub(crate) fn add_parent_paths(&mut self, real_path: &str) -> FsResult<()> {
        let parent = parent_path(real_path)?;
        if self.tree.node(&parent).is_some() {
            return Ok(());
        }

        let mut missing = Vec::new();
        for ancestor in constituent_paths(&parent)?.into_iter().rev() {
            if self.tree.node(&ancestor).is_some() {
                break;
            }
            missing.push(ancestor);
        }

        for ancestor in missing.into_iter().rev() {
            trace!(path = %ancestor, "materializing implicit directory");
            self.set_file_node(FileNode::new_dir(ancestor, None))?;
        }
        Ok(())
    }

    /// Install the node at its real path: replace in place when the key is
    /// already present, otherwise attach it under its parent.
    pub(crate) fn set_file_node(&mut self, node: FileNode) -> FsResult<()> {
        if self.tree.node(node.id()).is_some() {
            self.tree.replace(node)?;
            return Ok(());
        }

        let parent = parent_path(&node.real_path)?;
        if self.tree.node(&parent).is_none() {
            return Err(FsError::MissingParent {
                parent,
                child: node.real_path,
            });
        }

        self.tree.add_child(&parent, node)?;
        Ok(())
    }

    /// Remove the node at `path` along with its whole subtree. When the
    /// basename is a link, the link itself is removed, never its target.
    /// Removing an absent path is a no-op; removing `/` is an error.
    pub fn remove_path(&mut self, path: &str) -> FsResult<()> {
        let normalized = normalize_path(path)?;
        if normalized == "/" {
            return Err(FsError::RemovingRoot);
        }

        let (_, node) = self.resolve_node(
            &normalized,
            LinkResolutionStrategy {
                follow_ancestor_links: true,
                ..Default::default()
            },
        )?;
        let Some(node) = node else {
            return Ok(());
        };

        let removed = self.tree.remove_subtree(node.id())?;
        debug!(path = %node.real_path, removed, "removed path");
        Ok(())
    }

    /// Remove every direct child subtree of `path`, keeping the node
    /// itself. A link basename is followed first, so the target's children
    /// are removed. Absent paths are a no-op.
    pub fn remove_child_paths(&mut self, path: &str) -> FsResult<()> {
        let (_, node) = self.resolve_node(
            path,
            LinkResolutionStrategy {
                follow_ancestor_links: true,
                follow_basename_links: true,
                ..Default::default()
            },
        )?;
        let Some(node) = node else {
            return Ok(());
        };

        let child_ids: Vec<String> =
            self.tree.children(node.id()).iter().map(|child| child.id().to_string()).collect();
        for id in &child_ids {
            self.tree.remove_subtree(id)?;
        }
        debug!(path = %node.real_path, children = child_ids.len(), "removed child paths");
        Ok(())
    }

    // -- queries ----------------------------------------------------------

    /// Fetch the reference at `path`. The first value reports whether the
    /// path exists at all; the reference may still be `None` for implicit
    /// ancestors.
    ///
    /// A direct hit on a non-link node (or on a link when basename
    /// following is off) is returned as-is; otherwise the path is
    /// re-resolved with ancestor links followed and the basename handled
    /// per `options`.
    pub fn file(&self, path: &str, options: LinkOptions) -> FsResult<(bool, Option<FileReference>)> {
        let (_, direct) = self.resolve_node(path, LinkResolutionStrategy::default())?;
        if let Some(node) = direct {
            if !node.is_link() || !options.follow_basename_links {
                return Ok((true, node.reference));
            }
        }

        let (_, resolved) = self.resolve_node(
            path,
            LinkResolutionStrategy {
                follow_ancestor_links: true,
                follow_basename_links: options.follow_basename_links,
                do_not_follow_dead_basename_links: options.do_not_follow_dead_basename_links,
            },
        )?;
        match resolved {
            Some(node) => Ok((true, node.reference)),
            None => Ok((false, None)),
        }
    }

    /// Whether the path exists, following basename links. Resolution errors
    /// (cycles) read as absent.
    pub fn has_path(&self, path: &str) -> bool {
        self.file(path, LinkOptions::follow_basename())
            .map(|(exists, _)| exists)
            .unwrap_or(false)
    }

    /// List the direct children of `dir`, expressed under the caller's view
    /// of the directory (the queried path, not the children's canonical
    /// locations). Non-directories and absent paths list as empty.
    pub fn list_paths(&self, dir: &str) -> FsResult<Vec<String>> {
        let (_, node) = self.resolve_node(
            dir,
            LinkResolutionStrategy {
                follow_ancestor_links: true,
                follow_basename_links: true,
                ..Default::default()
            },
        )?;
        let Some(node) = node else {
            return Ok(Vec::new());
        };
        if node.file_type != FileType::Directory {
            return Ok(Vec::new());
        }

        let dir = normalize_path(dir)?;
        let mut listing = Vec::new();
        for child in self.tree.children(node.id()) {
            // re-resolve so the listed basename reflects the child's own
            // name after ancestor-link resolution
            let (base_path, _) = self.resolve_node(
                &child.real_path,
                LinkResolutionStrategy {
                    follow_ancestor_links: true,
                    ..Default::default()
                },
            )?;
            listing.push(join(&dir, crate::fs::path::base_name(&base_path)));
        }
        Ok(listing)
    }

    /// References of every regular file that carries one, sorted by path.
    pub fn all_files(&self) -> Vec<FileReference> {
        let mut files: Vec<FileReference> = self
            .tree
            .nodes()
            .filter(|node| node.file_type == FileType::RegularFile)
            .filter_map(|node| node.reference.clone())
            .collect();
        files.sort_by(|a, b| a.real_path.cmp(&b.real_path));
        files
    }

    /// Real path of every node in the tree, sorted.
    pub fn all_real_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.tree.nodes().map(|node| node.real_path.clone()).collect();
        paths.sort();
        paths
    }

    /// Paths present in `other` but not here, and paths present here but
    /// not in `other`. Both vectors are sorted.
    pub fn path_diff(&self, other: &FileTree) -> (Vec<String>, Vec<String>) {
        let ours: HashSet<&str> = self.tree.nodes().map(|node| node.id()).collect();
        let theirs: HashSet<&str> = other.tree.nodes().map(|node| node.id()).collect();

        let mut extra: Vec<String> =
            theirs.difference(&ours).map(|path| path.to_string()).collect();
        let mut missing: Vec<String> =
            ours.difference(&theirs).map(|path| path.to_string()).collect();
        extra.sort();
        missing.sort();
        (extra, missing)
    }

    /// Whether both trees hold exactly the same set of real paths.
    pub fn equal(&self, other: &FileTree) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let (extra, missing) = self.path_diff(other);
        extra.is_empty() && missing.is_empty()
    }

    /// Depth-first traversal over the real nodes of the tree (virtual paths
    /// induced by symlinks are not visited). The visitor's error aborts the
    /// walk and is returned unchanged.
    pub fn walk<E>(&self, mut visit: impl FnMut(&str, &FileNode) -> Result<(), E>) -> Result<(), E> {
        DepthFirstWalker::new(&self.tree).walk(|node| visit(&node.real_path, node), None)
    }

    // -- merge ------------------------------------------------------------

    /// Apply `upper` onto this tree with overlay semantics: whiteout
    /// basenames delete the matching lower sibling, opaque-directory
    /// sentinels clear lower children before upper children are grafted,
    /// and everything else replaces (or is inserted at) its lower path.
    /// This is the basis of squashing.
    pub fn merge(&mut self, upper: &FileTree) -> FsResult<()> {
        let conditions = WalkConditions {
            should_continue_branch: Some(Box::new(|node: &FileNode| !is_whiteout(&node.real_path))),
            should_visit: Some(Box::new(|node: &FileNode| !is_opaque_whiteout(&node.real_path))),
        };

        DepthFirstWalker::new(&upper.tree)
            .walk(|upper_node| self.merge_node(upper, upper_node), Some(&conditions))
    }

    fn merge_node(&mut self, upper: &FileTree, upper_node: &FileNode) -> FsResult<()> {
        let upper_path = upper_node.real_path.as_str();

        // opaque directories are handled before the node's own effects so
        // that lower children are gone before upper children are grafted
        if upper.has_opaque_directory(upper_path) {
            trace!(path = %upper_path, "upper directory is opaque, clearing lower children");
            self.remove_child_paths(upper_path)
                .map_err(|err| FsError::merge_at(upper_path, err))?;
        }

        if is_whiteout(upper_path) {
            let lower_path =
                un_whiteout_path(upper_path).map_err(|err| FsError::merge_at(upper_path, err))?;
            trace!(marker = %upper_path, target = %lower_path, "applying whiteout");
            self.remove_path(&lower_path).map_err(|err| FsError::merge_at(upper_path, err))?;
            return Ok(());
        }

        let (_, original) = self
            .resolve_node(upper_path, LinkResolutionStrategy::default())
            .map_err(|err| FsError::merge_at(upper_path, err))?;

        if original.is_none() {
            self.add_parent_paths(upper_path).map_err(|err| FsError::merge_at(upper_path, err))?;
        }

        let mut node_copy = upper_node.clone();

        // keep the lower reference when the upper layer re-describes the
        // node without attaching content of its own
        if let Some(original) = &original {
            if original.reference.is_some()
                && upper_node.reference.is_none()
                && upper_node.file_type == original.file_type
            {
                node_copy.reference = original.reference.clone();
            }
        }

        self.set_file_node(node_copy).map_err(|err| FsError::merge_at(upper_path, err))
    }

    /// Whether the opaque-directory sentinel sits directly inside
    /// `directory_path` in this tree.
    fn has_opaque_directory(&self, directory_path: &str) -> bool {
        self.has_path(&join(directory_path, OPAQUE_WHITEOUT))
    }
}
