//! MIME types for published and uploaded files.

use std::path::Path;

/// MIME type constants.
pub mod types {
    // Basic records
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";

    // Generic text records (`type` tag)
    pub const PLAIN: &str = "text/plain";
    pub const CSV: &str = "text/csv";
    pub const PDF: &str = "application/pdf";
    pub const JSON: &str = "application/json";
    pub const YAML: &str = "application/x-yaml";
    pub const SVG: &str = "image/svg+xml";

    // Media uploads
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const MP4: &str = "video/mp4";
    pub const MOV: &str = "video/quicktime";
    pub const MPEG: &str = "video/mpeg";
    pub const WEBM: &str = "video/webm";
    pub const MP3: &str = "audio/mpeg";

    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Guess MIME type from a file path.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    from_extension(ext.as_deref())
}

/// Guess MIME type from a lower-cased extension.
///
/// Generic text types carry no charset: the value is forwarded verbatim as
/// the `type` tag and later as the response content type.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext {
        Some("html") => types::HTML,
        Some("css") => types::CSS,
        Some("js") => types::JAVASCRIPT,

        Some("txt") => types::PLAIN,
        Some("csv") => types::CSV,
        Some("pdf") => types::PDF,
        Some("json") => types::JSON,
        Some("yml" | "yaml") => types::YAML,
        Some("svg") => types::SVG,

        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("mp4") => types::MP4,
        Some("mov") => types::MOV,
        Some("mpeg" | "mpg") => types::MPEG,
        Some("webm") => types::WEBM,
        Some("mp3" | "mpeg3") => types::MP3,

        _ => types::OCTET_STREAM,
    }
}
