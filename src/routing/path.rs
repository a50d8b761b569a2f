//! Pure path helpers used for route lookup and upstream rewriting.

/// Collapse runs of `/`, drop one trailing slash, force a leading slash.
///
/// Empty input, or input made only of slashes, yields `/`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Compute the upstream path for a request.
///
/// The remainder of `request_path` after the first occurrence of
/// `source_path` is appended to `target_path` (unless the target is `/`).
/// If the source does not occur, the remainder is empty.
pub fn rewrite_target_path(source_path: &str, target_path: &str, request_path: &str) -> String {
    let remainder = request_path
        .find(source_path)
        .map(|idx| &request_path[idx + source_path.len()..])
        .unwrap_or("");

    let mut rewritten = String::with_capacity(target_path.len() + remainder.len() + 1);
    if target_path != "/" {
        rewritten.push_str(target_path);
    }
    if !remainder.is_empty() && !remainder.starts_with('/') && !rewritten.ends_with('/') {
        rewritten.push('/');
    }
    rewritten.push_str(remainder);

    if rewritten.is_empty() {
        return "/".to_string();
    }
    if !rewritten.starts_with('/') {
        rewritten.insert(0, '/');
    }
    rewritten
}

/// Split `path?query` into its parts.
pub fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((p, q)) => (p, Some(q).filter(|q| !q.is_empty())),
        None => (path, None),
    }
}

/// Candidate prefixes of a normalized path, longest first, ending with `/`.
pub(crate) fn prefixes(normalized: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(normalized);
    std::iter::from_fn(move || {
        let current = next?;
        next = match current.rfind('/') {
            _ if current == "/" => None,
            Some(0) => Some("/"),
            Some(idx) => Some(&current[..idx]),
            None => None,
        };
        Some(current)
    })
}
