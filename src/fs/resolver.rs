use std::collections::HashSet;

use tracing::trace;

use crate::fs::error::{FsError, FsResult};
use crate::fs::filetree::FileTree;
use crate::fs::node::FileNode;
use crate::fs::path::{join, normalize_path, parent_path};

/// Full three-flag strategy used internally by lookups.
///
/// `do_not_follow_dead_basename_links` is only consulted when
/// `follow_basename_links` is set: it keeps the last live link of a chain
/// that terminates at a missing target, instead of reporting absence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LinkResolutionStrategy {
    pub follow_ancestor_links: bool,
    pub follow_basename_links: bool,
    pub do_not_follow_dead_basename_links: bool,
}

impl LinkResolutionStrategy {
    pub fn follows_links(&self) -> bool {
        self.follow_ancestor_links || self.follow_basename_links
    }
}

/// Caller-facing link options for queries. Ancestor links are always
/// followed on the query fallback path; these flags only steer what happens
/// to the final path segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkOptions {
    pub follow_basename_links: bool,
    pub do_not_follow_dead_basename_links: bool,
}

impl LinkOptions {
    /// Resolve the basename when it is a link.
    pub fn follow_basename() -> Self {
        Self {
            follow_basename_links: true,
            do_not_follow_dead_basename_links: false,
        }
    }

    /// Resolve the basename, but keep the last link of a chain that ends at
    /// a missing target rather than reporting absence.
    pub fn follow_basename_keep_dead() -> Self {
        Self {
            follow_basename_links: true,
            do_not_follow_dead_basename_links: true,
        }
    }
}

impl FileTree {
    /// Look up `path` under the given strategy. Returns the resolved
    /// canonical path together with the node, if any. Absence is not an
    /// error; only link cycles are.
    pub(crate) fn resolve_node(
        &self,
        path: &str,
        strategy: LinkResolutionStrategy,
    ) -> FsResult<(String, Option<FileNode>)> {
        let normalized = normalize_path(path)?;

        if !strategy.follows_links() {
            let node = self.tree.node(&normalized).cloned();
            return Ok((normalized, node));
        }

        // one visited set spans the whole resolution, nested ancestor hops
        // included, so cyclic trees fail instead of recursing unboundedly
        let mut visited: HashSet<String> = HashSet::new();

        let (current_path, current_node) = if strategy.follow_ancestor_links {
            self.resolve_ancestor_links(&normalized, &mut visited)?
        } else {
            let node = self.tree.node(&normalized).cloned();
            (normalized, node)
        };

        let Some(node) = current_node else {
            return Ok((current_path, None));
        };

        if strategy.follow_basename_links {
            return self.resolve_node_links(
                &node,
                !strategy.do_not_follow_dead_basename_links,
                &mut visited,
            );
        }

        Ok((current_path, Some(node)))
    }

    /// Walk the constituent segments of `path` left to right, swapping any
    /// intermediate link for its resolved target. The final segment is
    /// never resolved here; basename handling is separate.
    fn resolve_ancestor_links(
        &self,
        path: &str,
        visited: &mut HashSet<String>,
    ) -> FsResult<(String, Option<FileNode>)> {
        // the root is never resolved as a link
        let mut current_path = "/".to_string();
        let mut current_node = self.tree.node("/").cloned();

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last = segments.len().saturating_sub(1);

        for (idx, segment) in segments.iter().enumerate() {
            current_path = join(&current_path, segment);

            let Some(node) = self.tree.node(&current_path).cloned() else {
                // a constituent path that was never observed: unresolvable,
                // but not an error
                return Ok((current_path, None));
            };

            // a reference-less node is an implicit ancestor; keep
            // accumulating the path through it
            if node.reference.is_none() {
                current_node = Some(node);
                continue;
            }

            if idx != last && node.is_link() {
                trace!(path = %current_path, "resolving intermediate link");
                let (resolved_path, resolved_node) = self.resolve_node_links(&node, true, visited)?;
                current_path = resolved_path;
                current_node = resolved_node;
                continue;
            }

            current_node = Some(node);
        }

        Ok((current_path, current_node))
    }

    /// Follow the link chain starting at `node` until a non-link node is
    /// found or the chain dies. Assumes the node's own constituent segments
    /// hold no links.
    pub(crate) fn resolve_node_links(
        &self,
        node: &FileNode,
        follow_dead_basename_links: bool,
        visited: &mut HashSet<String>,
    ) -> FsResult<(String, Option<FileNode>)> {
        let mut last_link: Option<(String, FileNode)> = None;

        let mut current_path = node.real_path.clone();
        let mut current_node = Some(node.clone());

        loop {
            let Some(node) = current_node.clone() else {
                // dead link: there is no next node to inspect
                break;
            };

            if visited.contains(&current_path) {
                return Err(FsError::LinkCycleDetected { path: current_path });
            }

            if !node.is_link() {
                break;
            }

            visited.insert(current_path.clone());

            let target = node.link_target.clone().unwrap_or_default();
            let next_path = if target.starts_with('/') {
                normalize_path(&target)?
            } else {
                // relative targets resolve against the link's own parent
                let parent = parent_path(&node.real_path)?;
                normalize_path(&join(&parent, &target))?
            };
            trace!(link = %current_path, target = %next_path, "following link");

            // keep the link itself in case the chain dies and the caller
            // asked to retain dead basenames
            last_link = Some((current_path.clone(), node));

            let (resolved_path, resolved_node) = self.resolve_ancestor_links(&next_path, visited)?;
            current_path = resolved_path;
            current_node = resolved_node;
        }

        if current_node.is_none() && !follow_dead_basename_links {
            if let Some((link_path, link_node)) = last_link {
                return Ok((link_path, Some(link_node)));
            }
        }

        Ok((current_path, current_node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::node::FileType;

    #[test]
    fn test_no_follow_is_direct_lookup() {
        let mut tree = FileTree::new();
        tree.add_symlink("/link", "/target").unwrap();

        let (path, node) = tree.resolve_node("/link", LinkResolutionStrategy::default()).unwrap();
        assert_eq!(path, "/link");
        assert_eq!(node.unwrap().file_type, FileType::Symlink);
    }

    #[test]
    fn test_absent_path_is_not_an_error() {
        let tree = FileTree::new();
        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            ..Default::default()
        };

        let (_, node) = tree.resolve_node("/no/such/path", strategy).unwrap();
        assert!(node.is_none());
    }

    #[test]
    fn test_ancestor_link_is_swapped_for_target() {
        let mut tree = FileTree::new();
        tree.add_symlink("/link", "/target").unwrap();
        tree.add_file("/target/x").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            ..Default::default()
        };
        let (path, node) = tree.resolve_node("/link/x", strategy).unwrap();
        assert_eq!(path, "/target/x");
        assert_eq!(node.unwrap().file_type, FileType::RegularFile);
    }

    #[test]
    fn test_relative_target_resolves_against_link_parent() {
        let mut tree = FileTree::new();
        tree.add_file("/usr/share/data.txt").unwrap();
        tree.add_symlink("/usr/bin/data", "../share/data.txt").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            ..Default::default()
        };
        let (path, node) = tree.resolve_node("/usr/bin/data", strategy).unwrap();
        assert_eq!(path, "/usr/share/data.txt");
        assert_eq!(node.unwrap().file_type, FileType::RegularFile);
    }

    #[test]
    fn test_chained_links_resolve_to_terminal_node() {
        let mut tree = FileTree::new();
        tree.add_symlink("/one", "/two").unwrap();
        tree.add_symlink("/two", "/three").unwrap();
        tree.add_file("/three").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            ..Default::default()
        };
        let (path, node) = tree.resolve_node("/one", strategy).unwrap();
        assert_eq!(path, "/three");
        assert_eq!(node.unwrap().file_type, FileType::RegularFile);
    }

    #[test]
    fn test_two_link_cycle_is_detected() {
        let mut tree = FileTree::new();
        tree.add_symlink("/a", "/b").unwrap();
        tree.add_symlink("/b", "/a").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            ..Default::default()
        };
        let err = tree.resolve_node("/a", strategy).unwrap_err();
        assert!(matches!(err, FsError::LinkCycleDetected { .. }));
    }

    #[test]
    fn test_self_link_cycle_is_detected() {
        let mut tree = FileTree::new();
        tree.add_symlink("/selfie", "/selfie").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            ..Default::default()
        };
        let err = tree.resolve_node("/selfie", strategy).unwrap_err();
        assert!(matches!(err, FsError::LinkCycleDetected { .. }));
    }

    #[test]
    fn test_dead_link_reports_absence_by_default() {
        let mut tree = FileTree::new();
        tree.add_symlink("/dangling", "/nowhere").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            ..Default::default()
        };
        let (path, node) = tree.resolve_node("/dangling", strategy).unwrap();
        assert_eq!(path, "/nowhere");
        assert!(node.is_none());
    }

    #[test]
    fn test_dead_link_is_retained_on_request() {
        let mut tree = FileTree::new();
        tree.add_symlink("/dangling", "/nowhere").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            do_not_follow_dead_basename_links: true,
        };
        let (path, node) = tree.resolve_node("/dangling", strategy).unwrap();
        assert_eq!(path, "/dangling");
        let node = node.unwrap();
        assert!(node.is_link());
        assert_eq!(node.real_path, "/dangling");
    }

    #[test]
    fn test_root_resolves_to_itself() {
        let tree = FileTree::new();
        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            follow_basename_links: true,
            ..Default::default()
        };

        let (path, node) = tree.resolve_node("/", strategy).unwrap();
        assert_eq!(path, "/");
        assert_eq!(node.unwrap().file_type, FileType::Directory);
    }

    #[test]
    fn test_implicit_ancestor_does_not_stop_resolution() {
        let mut tree = FileTree::new();
        // /a and /a/b become implicit directories with no reference
        tree.add_file("/a/b/c").unwrap();

        let strategy = LinkResolutionStrategy {
            follow_ancestor_links: true,
            ..Default::default()
        };
        let (path, node) = tree.resolve_node("/a/b/c", strategy).unwrap();
        assert_eq!(path, "/a/b/c");
        assert!(node.is_some());
    }
}
