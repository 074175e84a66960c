use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::error::{FsError, FsResult};
use crate::fs::filetree::FileTree;
use crate::fs::node::{FileReference, FileType};
use crate::fs::path::join;
use crate::fs::resolver::{LinkOptions, LinkResolutionStrategy};
use crate::fs::view::TreeView;

/// One glob hit: the virtual path the pattern matched, the canonical path
/// it resolved to, the reference if the node carries one, and whether
/// resolution stopped at a dead link that was retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobResult {
    pub match_path: String,
    pub real_path: String,
    pub reference: Option<FileReference>,
    pub is_dead_link: bool,
}

impl FileTree {
    /// Find all non-directory entries whose virtual path matches `pattern`.
    ///
    /// Matching itself is delegated to [`glob::Pattern`] over a [`TreeView`]
    /// of this tree, so the pattern observes the same reachability the
    /// resolver does, symlinked directories included. Basename links of
    /// matches are always followed; `options` only controls whether a dead
    /// chain retains its last link (reported with `is_dead_link`).
    ///
    /// Patterns not starting with `/` are taken relative to the root.
    pub fn files_by_glob(&self, pattern: &str, options: LinkOptions) -> FsResult<Vec<GlobResult>> {
        if pattern.is_empty() {
            return Err(FsError::NoGlobPattern);
        }

        let pattern = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("/{pattern}")
        };
        let matcher = glob::Pattern::new(&pattern)?;
        let match_options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let view = TreeView::new(self);
        let mut candidates = Vec::new();
        let mut on_branch = HashSet::from(["/".to_string()]);
        self.collect_virtual_paths(&view, "/", &mut on_branch, &mut candidates)?;

        let mut results = Vec::new();
        for candidate in candidates {
            if !matcher.matches_with(&candidate, match_options) {
                continue;
            }

            let (_, node) = self.resolve_node(
                &candidate,
                LinkResolutionStrategy {
                    follow_ancestor_links: true,
                    follow_basename_links: true,
                    do_not_follow_dead_basename_links: options.do_not_follow_dead_basename_links,
                },
            )?;
            let Some(node) = node else {
                continue;
            };
            if node.file_type == FileType::Directory {
                continue;
            }

            results.push(GlobResult {
                match_path: candidate,
                real_path: node.real_path.clone(),
                reference: node.reference.clone(),
                // basename links were followed, so a remaining link kind
                // means the chain died and was retained
                is_dead_link: node.is_link(),
            });
        }

        results.sort_by(|a, b| a.match_path.cmp(&b.match_path));
        debug!(pattern = %pattern, matches = results.len(), "glob query");
        Ok(results)
    }

    /// Enumerate every virtual path reachable from `dir`, descending
    /// through directories (symlinked ones included). `on_branch` tracks
    /// the canonical directories of the current branch so a link back to an
    /// ancestor does not recurse forever.
    fn collect_virtual_paths(
        &self,
        view: &TreeView<'_>,
        dir: &str,
        on_branch: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) -> FsResult<()> {
        for entry in view.read_dir(dir)? {
            let virtual_path = join(dir, &entry.name);
            out.push(virtual_path.clone());

            if entry.file_type != FileType::Directory {
                continue;
            }
            let Some(resolved) = view.stat(&virtual_path, LinkOptions::follow_basename())? else {
                continue;
            };
            if on_branch.insert(resolved.real_path.clone()) {
                self.collect_virtual_paths(view, &virtual_path, on_branch, out)?;
                on_branch.remove(&resolved.real_path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_fails() {
        let tree = FileTree::new();
        let err = tree.files_by_glob("", LinkOptions::default()).unwrap_err();
        assert!(matches!(err, FsError::NoGlobPattern));
    }

    #[test]
    fn test_pattern_is_rooted_when_relative() {
        let mut tree = FileTree::new();
        tree.add_file("/etc/hosts").unwrap();

        let results = tree.files_by_glob("etc/hosts", LinkOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_path, "/etc/hosts");
    }

    #[test]
    fn test_star_does_not_cross_separators() {
        let mut tree = FileTree::new();
        tree.add_file("/a/top.txt").unwrap();
        tree.add_file("/a/b/deep.txt").unwrap();

        let results = tree.files_by_glob("/a/*.txt", LinkOptions::default()).unwrap();
        let matches: Vec<&str> = results.iter().map(|r| r.match_path.as_str()).collect();
        assert_eq!(matches, vec!["/a/top.txt"]);
    }

    #[test]
    fn test_recursive_pattern_matches_deep_files() {
        let mut tree = FileTree::new();
        tree.add_file("/a/top.txt").unwrap();
        tree.add_file("/a/b/deep.txt").unwrap();
        tree.add_file("/a/b/other.log").unwrap();

        let results = tree.files_by_glob("/**/*.txt", LinkOptions::default()).unwrap();
        let matches: Vec<&str> = results.iter().map(|r| r.match_path.as_str()).collect();
        assert_eq!(matches, vec!["/a/b/deep.txt", "/a/top.txt"]);
    }

    #[test]
    fn test_directories_are_excluded_from_results() {
        let mut tree = FileTree::new();
        tree.add_dir("/data").unwrap();
        tree.add_file("/data/file").unwrap();

        let results = tree.files_by_glob("/data*", LinkOptions::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_match_through_symlinked_directory() {
        let mut tree = FileTree::new();
        tree.add_file("/real/app.conf").unwrap();
        tree.add_symlink("/alias", "/real").unwrap();

        let results = tree.files_by_glob("/alias/*.conf", LinkOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_path, "/alias/app.conf");
        assert_eq!(results[0].real_path, "/real/app.conf");
        assert!(!results[0].is_dead_link);
    }

    #[test]
    fn test_link_basename_resolves_to_target() {
        let mut tree = FileTree::new();
        let target_ref = tree.add_file("/target").unwrap();
        tree.add_symlink("/link", "/target").unwrap();

        let results = tree.files_by_glob("/link", LinkOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].real_path, "/target");
        assert_eq!(results[0].reference.as_ref().unwrap().id, target_ref.id);
    }

    #[test]
    fn test_dead_link_dropped_unless_retained() {
        let mut tree = FileTree::new();
        tree.add_symlink("/dangling", "/nowhere").unwrap();

        let dropped = tree.files_by_glob("/dangling", LinkOptions::default()).unwrap();
        assert!(dropped.is_empty());

        let retained = tree
            .files_by_glob("/dangling", LinkOptions::follow_basename_keep_dead())
            .unwrap();
        assert_eq!(retained.len(), 1);
        assert!(retained[0].is_dead_link);
        assert_eq!(retained[0].real_path, "/dangling");
    }

    #[test]
    fn test_symlink_loop_does_not_hang_enumeration() {
        let mut tree = FileTree::new();
        tree.add_dir("/dir").unwrap();
        tree.add_file("/dir/file").unwrap();
        tree.add_symlink("/dir/up", "/").unwrap();

        let results = tree.files_by_glob("/**/file", LinkOptions::default()).unwrap();
        assert!(!results.is_empty());
    }
}
