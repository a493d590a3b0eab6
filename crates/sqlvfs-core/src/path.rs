// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Canonical path handling.
//!
//! Every path stored in the node table is absolute, uses `/` as the only
//! separator, contains no `.`/`..` or empty segments, and has no trailing
//! separator except for the root itself.

pub const ROOT: &str = "/";

/// Canonicalize a client-supplied path. Never fails: `..` above the root is
/// clamped to the root and empty input maps to the root.
pub fn normalize(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        return ROOT.to_string();
    }

    let mut out = String::with_capacity(raw.len() + 1);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

pub fn is_canonical(path: &str) -> bool {
    normalize(path) == path
}

/// Parent of a canonical path; the root has the empty string as parent.
pub fn parent(path: &str) -> &str {
    if path == ROOT {
        return "";
    }
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

/// Last component of a canonical path; the root is named `/`.
pub fn base_name(path: &str) -> &str {
    if path == ROOT {
        return ROOT;
    }
    path.rsplit('/').next().unwrap_or(path)
}

/// Non-root prefixes of `path`, root-to-leaf: `/a/b` yields `/a`, `/a/b`.
pub fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .skip(1)
        .map(|(idx, _)| &path[..idx])
        .chain((path != ROOT).then_some(path))
        .collect()
}

/// True when `path` is `dir` itself or lies anywhere beneath it.
pub fn is_within(path: &str, dir: &str) -> bool {
    if dir == ROOT {
        return true;
    }
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
