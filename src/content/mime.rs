//! Content types by file extension.

use std::path::Path;

/// Type used for unknown or missing extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Content type for an extension, without the leading dot.
pub fn for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "ico" => "image/x-icon",
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "css" => "text/css",
        "js" => "text/javascript",
        "dart" => "application/dart",
        "ogg" => "application/ogg",
        "wav" => "audio/x-wav",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Content type for a file path.
pub fn content_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(for_extension)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
