//! Path composition and name cleaning
//!
//! Logical names are `/`-separated relative strings. [`safe_join`] is the
//! single gate that turns a root plus caller-supplied segments into a path,
//! and it refuses any result that lands outside the root.

use crate::error::{Result, StorageError};

/// Join `segments` onto `base`, refusing results outside of `base`.
///
/// Each segment is resolved against the accumulated path the way a URL
/// reference is resolved against a base URL, so `..` walks upward and `.`
/// or repeated separators vanish. Leading separators on a segment do not
/// make it absolute: it is still resolved relative to the accumulator.
///
/// The result must start with `base` followed by either nothing or a `/`,
/// otherwise [`StorageError::ContainmentViolation`] is returned. A leading
/// separator is stripped from the returned path. With no segments `base`
/// is returned untouched.
///
/// ```
/// use stowage::path::safe_join;
///
/// assert_eq!(safe_join("media", &["photos/../cat.png"]).unwrap(), "media/cat.png");
/// assert!(safe_join("/data", &["../data-evil/x"]).is_err());
/// ```
pub fn safe_join<S: AsRef<str>>(base: &str, segments: &[S]) -> Result<String> {
    if segments.is_empty() {
        return Ok(base.to_string());
    }
    let joined = join_contained(base, segments)?;
    Ok(joined.trim_start_matches('/').to_string())
}

/// Same as [`safe_join`] but keeps the leading separator.
///
/// Used where the result has to stay anchored at an absolute root, such as
/// a directory on the local filesystem.
pub fn join_contained<S: AsRef<str>>(base: &str, segments: &[S]) -> Result<String> {
    let base = base.replace('\\', "/");
    let base_path = base.trim_end_matches('/');

    let mut final_path = base_path.to_string();
    for segment in segments {
        final_path = resolve_reference(&final_path, segment.as_ref());
    }

    match final_path.strip_prefix(base_path) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => Ok(final_path),
        _ => {
            let requested: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
            Err(StorageError::containment(requested.join("/")))
        }
    }
}

fn resolve_reference(accumulated: &str, segment: &str) -> String {
    let segment = segment.replace('\\', "/");
    let segment = segment.trim_matches('/');
    let accumulated = accumulated.trim_end_matches('/');
    if segment.is_empty() {
        return accumulated.to_string();
    }
    remove_dot_segments(&format!("{}/{}", accumulated, segment))
}

// `..` above the top is dropped here; the prefix check in `join_contained`
// is what rejects such paths.
fn remove_dot_segments(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    if path.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Lexically normalize a name: `\` becomes `/`, `.` and empty components
/// disappear and `..` cancels the preceding component.
///
/// Leading `..` components that cannot be cancelled are kept on relative
/// names, so containment is still decided by [`safe_join`].
pub fn normalize(name: &str) -> String {
    let name = name.replace('\\', "/");
    let absolute = name.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if !absolute => parts.push(".."),
                _ => {}
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Normalize a caller-supplied logical name and make it relative.
pub fn clean_name(name: &str) -> String {
    normalize(name).trim_start_matches('/').to_string()
}

/// Last component of a `/`- or `\`-separated name.
pub fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Parent of a logical name, `""` for top-level names.
pub fn parent(name: &str) -> &str {
    name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Split a name into directory, stem and extension.
///
/// The extension keeps its dot. Leading dots belong to the stem, so
/// `.bashrc` has no extension.
pub fn split_name(name: &str) -> (&str, &str, &str) {
    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => ("", name),
    };
    let leading = file.len() - file.trim_start_matches('.').len();
    match file[leading..].rfind('.') {
        Some(dot) => {
            let split = leading + dot;
            (dir, &file[..split], &file[split..])
        }
        None => (dir, file, ""),
    }
}

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce a file name to a conservative ASCII subset.
///
/// Separators turn into spaces, whitespace runs into `_`, and everything
/// outside `[A-Za-z0-9_.-]` is dropped. The result never starts or ends
/// with `.` or `_`, and Windows device names get a `_` prefix. May return
/// an empty string.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

    let device = trimmed.split('.').next().unwrap_or("").to_ascii_uppercase();
    if WINDOWS_DEVICE_NAMES.contains(&device.as_str()) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}
