//! Remote path and file-type utilities.
//!
//! Remote paths are POSIX-style, absolute, and never end with a slash except for the root.

/// Video container extensions (lowercase, with dot).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".m4v", ".ts", ".m2ts", ".webm",
];

/// Subtitle sidecar extensions (lowercase, with dot).
pub const SUBTITLE_EXTENSIONS: &[&str] = &[".srt", ".ass", ".ssa", ".vtt", ".sub", ".idx", ".sup"];

/// Normalize a remote path: forward slashes, leading slash, no trailing slash.
pub fn norm_path(p: &str) -> String {
    if p.is_empty() {
        return "/".to_string();
    }
    let mut out = p.replace('\\', "/");
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Join a directory path and a child name.
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = norm_path(dir);
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Split a path into `(parent, basename)`. The root splits into `("/", "")`.
pub fn split_path(p: &str) -> (String, String) {
    let p = norm_path(p);
    if p == "/" {
        return ("/".to_string(), String::new());
    }
    match p.rsplit_once('/') {
        Some(("", base)) => ("/".to_string(), base.to_string()),
        Some((parent, base)) => (parent.to_string(), base.to_string()),
        None => ("/".to_string(), p),
    }
}

/// Last path component.
pub fn basename(p: &str) -> String {
    split_path(p).1
}

/// Split a file name into `(stem, extension)`; the extension keeps its dot and case.
///
/// Dotfiles (`.hidden`) have no extension.
pub fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && !name[..idx].ends_with('/') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Lowercased extension with dot, or an empty string.
pub fn get_extension(name: &str) -> String {
    split_ext(name).1.to_lowercase()
}

/// Check if a file is a video file based on extension.
pub fn is_video_file(name: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&get_extension(name).as_str())
}

/// Check if a file is a subtitle sidecar based on extension.
pub fn is_subtitle_file(name: &str) -> bool {
    SUBTITLE_EXTENSIONS.contains(&get_extension(name).as_str())
}

/// Whether `path` equals `root` or lies below it.
pub fn is_within(path: &str, root: &str) -> bool {
    let path = norm_path(path);
    let root = norm_path(root);
    if root == "/" {
        return true;
    }
    path == root || path.starts_with(&format!("{}/", root))
}
