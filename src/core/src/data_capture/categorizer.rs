//! Resource classification by content type, falling back to URL extension.

use super::types::Category;

const JS_MIME_TYPES: [&str; 3] = [
    "application/javascript",
    "text/javascript",
    "application/x-javascript",
];
const CSS_MIME_TYPES: [&str; 1] = ["text/css"];
const HTML_MIME_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

const IMAGE_EXTENSIONS: [&str; 10] = [
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".bmp", ".svg", ".ico", ".avif", ".tiff",
];
const VIDEO_EXTENSIONS: [&str; 9] = [
    ".mp4", ".webm", ".mov", ".mkv", ".flv", ".m3u8", ".ts", ".avi", ".wmv",
];

/// Classifies a resource. The content type wins when it matches a known
/// group; otherwise the URL's file extension decides.
pub fn classify(url: &str, mime_type: Option<&str>) -> Category {
    if let Some(mime) = mime_type.map(str::to_ascii_lowercase) {
        if let Some(category) = classify_mime(&mime) {
            return category;
        }
    }

    let ext = url_extension(url);
    match ext.as_str() {
        e if IMAGE_EXTENSIONS.contains(&e) => Category::Image,
        e if VIDEO_EXTENSIONS.contains(&e) => Category::Video,
        ".js" | ".mjs" => Category::Js,
        ".css" => Category::Css,
        ".html" | ".htm" | ".shtml" => Category::Html,
        _ => Category::Other,
    }
}

fn classify_mime(mime: &str) -> Option<Category> {
    if JS_MIME_TYPES.iter().any(|m| mime.contains(m)) {
        Some(Category::Js)
    } else if CSS_MIME_TYPES.iter().any(|m| mime.contains(m)) {
        Some(Category::Css)
    } else if HTML_MIME_TYPES.iter().any(|m| mime.contains(m)) {
        Some(Category::Html)
    } else if mime.starts_with("image/") {
        Some(Category::Image)
    } else if mime.starts_with("video/") {
        Some(Category::Video)
    } else {
        None
    }
}

/// Lower-cased extension (with the dot) of the last segment of `url`,
/// ignoring query and fragment. Empty when the segment has no dot.
pub(crate) fn url_extension(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    let name = path.rsplit('/').next().unwrap_or(path);
    file_extension(name).to_ascii_lowercase()
}

/// Extension of a bare file name, including the leading dot.
pub(crate) fn file_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}
