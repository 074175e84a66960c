use crate::fs::error::{FsError, FsResult};

/// Basename prefix that marks the sibling (with the prefix stripped) as
/// deleted in this layer. Shared with the tar ingestion layer.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// Basename that marks its parent directory as opaque: lower-layer contents
/// of that directory are ignored when squashing.
pub const OPAQUE_WHITEOUT: &str = ".wh..wh..opq";

/// Normalize a path to an absolute, `/`-separated canonical form: repeated
/// separators and `.` segments are dropped, `..` segments pop (clamped at
/// the root).
pub fn normalize_path(path: &str) -> FsResult<String> {
    if path.is_empty() {
        return Err(FsError::InvalidPath("empty path".to_string()));
    }

    if path.contains('\0') {
        return Err(FsError::InvalidPath("path contains NUL character".to_string()));
    }

    if !path.starts_with('/') {
        return Err(FsError::InvalidPath(format!("path must be absolute: {path}")));
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Ok("/".to_string());
    }

    Ok(format!("/{}", parts.join("/")))
}

/// Parent of a normalized path. The root has no parent.
pub fn parent_path(path: &str) -> FsResult<String> {
    let normalized = normalize_path(path)?;

    if normalized == "/" {
        return Err(FsError::InvalidPath("the root path has no parent".to_string()));
    }

    match normalized.rfind('/') {
        Some(0) => Ok("/".to_string()),
        Some(pos) => Ok(normalized[..pos].to_string()),
        None => Err(FsError::InvalidPath(normalized)),
    }
}

/// Final component of a normalized path (`/` for the root).
pub fn base_name(path: &str) -> &str {
    if path == "/" {
        return "/";
    }
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// All ancestor paths of `path` plus the path itself, root first:
/// `/a/b/c` yields `["/", "/a", "/a/b", "/a/b/c"]`.
pub fn constituent_paths(path: &str) -> FsResult<Vec<String>> {
    let normalized = normalize_path(path)?;

    let mut paths = vec!["/".to_string()];
    if normalized == "/" {
        return Ok(paths);
    }

    let mut current = String::new();
    for segment in normalized.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        paths.push(current.clone());
    }
    Ok(paths)
}

/// Join a child name under a normalized directory path.
pub fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Whether the basename carries the whiteout prefix. Note that the opaque
/// sentinel also carries the prefix and therefore counts as a whiteout.
pub fn is_whiteout(path: &str) -> bool {
    base_name(path).starts_with(WHITEOUT_PREFIX)
}

/// Whether the basename is the opaque-directory sentinel.
pub fn is_opaque_whiteout(path: &str) -> bool {
    base_name(path) == OPAQUE_WHITEOUT
}

/// Recover the sibling path a whiteout marker deletes.
pub fn un_whiteout_path(path: &str) -> FsResult<String> {
    let normalized = normalize_path(path)?;
    let name = base_name(&normalized);

    let stripped = name
        .strip_prefix(WHITEOUT_PREFIX)
        .ok_or_else(|| FsError::InvalidPath(format!("not a whiteout path: {normalized}")))?;

    let parent = parent_path(&normalized)?;
    Ok(join(&parent, stripped))
}
