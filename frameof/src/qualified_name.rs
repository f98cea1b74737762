//! Qualified-name decomposition
//!
//! A qualified name has the form `[<path>/]<package>.<function>`. Every
//! function here is a pure scan for literal `/` and `.` bytes, total over any
//! input: malformed names produce a well-defined (possibly empty) slice.

/// Final path segment, ignoring trailing separators
///
/// An empty name yields `"."` and a name made only of separators yields `"/"`,
/// so an unresolved frame reports empty package and function names.
fn base(name: &str) -> &str {
    if name.is_empty() {
        return ".";
    }
    let trimmed = name.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Part of the final segment after its last `.`, or `""` when it has none
#[must_use]
pub fn function_name(name: &str) -> &str {
    let base = base(name);
    match base.rfind('.') {
        Some(i) => &base[i + 1..],
        None => "",
    }
}

/// Part of the final segment before its last `.`, or the whole segment
#[must_use]
pub fn package_name(name: &str) -> &str {
    let base = base(name);
    match base.rfind('.') {
        Some(i) => &base[..i],
        None => base,
    }
}

/// Everything before the final `/`, or the dotted prefix of a path-less name
///
/// A bare name with neither separator is its own package path.
#[must_use]
pub fn package_path(name: &str) -> &str {
    if let Some(i) = name.rfind('/') {
        return name[..=i].trim_end_matches('/');
    }
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

/// Rewrite a demangled Rust path into qualified-name form
///
/// `a::b::c::f` becomes `a/b/c.f`, `a::f` becomes `a.f` and a single segment
/// is kept as is. Separators nested in generics, tuples or slices are part of
/// the enclosing segment.
#[must_use]
pub fn from_rust_path(path: &str) -> String {
    let segments = split_top_level(path);
    match segments.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [package, function] => format!("{package}.{function}"),
        [dirs @ .., package, function] => {
            let mut out = dirs.join("/");
            out.push('/');
            out.push_str(package);
            out.push('.');
            out.push_str(function);
            out
        }
    }
}

fn split_top_level(path: &str) -> Vec<&str> {
    let bytes = path.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' => depth += 1,
            // `->` in fn pointer types does not close a generic
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' | b')' | b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&path[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if start < path.len() || !segments.is_empty() {
        segments.push(&path[start..]);
    }
    segments
}
