//! Destination file naming for fetched archives.

use std::path::{Component, Path, PathBuf};

use url::Url;

const FALLBACK_FILENAME: &str = "archive.bin";

/// Builds `dest_dir/<index>-<name>` where `name` is the last URL path segment.
///
/// The index prefix keeps two requests for the same URL from sharing a file.
pub(crate) fn destination_path(dest_dir: &Path, index: usize, url: &str) -> PathBuf {
    dest_dir.join(format!("{index:03}-{}", filename_from_url(url)))
}

/// Extracts a safe filename from the final segment of `url`.
pub(crate) fn filename_from_url(url: &str) -> String {
    let segment = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
    });

    match segment {
        Some(name) => {
            let sanitized = sanitize_filename(&name);
            if sanitized.trim_matches('_').is_empty() {
                FALLBACK_FILENAME.to_string()
            } else {
                sanitized
            }
        }
        None => FALLBACK_FILENAME.to_string(),
    }
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
