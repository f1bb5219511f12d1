//! Deterministic mapping from resource URLs to archive-relative paths.
//!
//! Every path has the shape `host/segment/.../file.ext[__qXXXXXXXX]`. Each
//! segment is percent-decoded and then scrubbed of characters that common
//! filesystems reject, so the result can be extracted anywhere. Distinct query
//! strings on the same path are kept apart by a fixed-width hash suffix.

use std::sync::LazyLock;

use log::debug;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use super::categorizer::file_extension;
use super::types::Category;

static FORBIDDEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"\\|?*/\x00-\x1F\x7F-\x{9F}]"#).expect("valid regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Derives the archive path for a resource. Never fails: unparsable URLs
/// land under `unknown/`.
pub fn to_path(url: &str, mime_type: Option<&str>, category: Category) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Unparsable resource url {:?}: {}", url, e);
            let fallback = sanitize_segment(url);
            return if fallback.is_empty() {
                "unknown/resource".to_string()
            } else {
                format!("unknown/{}", fallback)
            };
        }
    };

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}_{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    let host = sanitize_segment(&host.replace(':', "_"));

    let pathname = parsed.path();
    let mut segments: Vec<String> = pathname
        .split('/')
        .map(|seg| sanitize_segment(&percent_decode_str(seg).decode_utf8_lossy()))
        .collect();

    let mut file_name = segments.pop().unwrap_or_default();
    if pathname.ends_with('/') || file_name.is_empty() {
        file_name = "index".to_string();
    }

    if file_extension(&file_name).is_empty() {
        let ext = extension_for(mime_type, category).unwrap_or_else(|| ".bin".to_string());
        file_name.push_str(&ext);
    }

    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        file_name.push_str(&format!("__q{:08x}", query_hash(&format!("?{}", query))));
    }

    segments.push(file_name);
    std::iter::once(host)
        .chain(segments)
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replaces forbidden filesystem characters and control characters with `_`,
/// collapses whitespace runs and trims. Dot-only names become `_` so a segment
/// can never climb out of its parent.
pub fn sanitize_segment(segment: &str) -> String {
    let replaced = FORBIDDEN.replace_all(segment, "_");
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    let trimmed = collapsed.trim();
    match trimmed {
        "." | ".." => "_".to_string(),
        other => other.to_string(),
    }
}

/// Extension implied by the content type, or by the category when the
/// response carried no content type.
fn extension_for(mime_type: Option<&str>, category: Category) -> Option<String> {
    let mime = match mime_type.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mime) => mime.to_ascii_lowercase(),
        None => {
            return match category {
                Category::Js => Some(".js".to_string()),
                Category::Css => Some(".css".to_string()),
                Category::Html => Some(".html".to_string()),
                _ => None,
            }
        }
    };

    if mime.contains("javascript") {
        return Some(".js".to_string());
    }
    if mime.contains("text/css") {
        return Some(".css".to_string());
    }
    if mime.contains("text/html") {
        return Some(".html".to_string());
    }
    if mime.starts_with("image/") || mime.starts_with("video/") {
        let essence = mime.split(';').next().unwrap_or(&mime);
        let subtype = sanitize_segment(essence.split('/').nth(1).unwrap_or_default());
        if !subtype.is_empty() {
            return Some(format!(".{}", subtype));
        }
    }
    None
}

/// 32-bit FNV-1a over the raw query string (leading `?` included).
fn query_hash(query: &str) -> u32 {
    query.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
