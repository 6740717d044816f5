//! File category definitions.

use std::path::Path;

/// Kind of site file, determines how a reference to it is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// HTML document (.html) - published as a markup record
    Markup,
    /// Stylesheet (.css) - published as a stylesheet record
    Stylesheet,
    /// Script (.js) - published as a script record
    Script,
    /// Generic text-like file (.txt, .json, .svg, ...) - published base64 encoded
    GenericText,
    /// Binary media (.png, .mp4, ...) - uploaded to the media service
    Media,
}

/// Suffixes published as generic-text records.
const GENERIC_TEXT_EXTENSIONS: &[&str] = &["txt", "csv", "pdf", "json", "yml", "yaml", "svg"];

/// Suffixes uploaded through the media service.
const MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "mp4", "mov", "mpeg", "mpg", "webm", "mp3", "mpeg3",
];

impl FileKind {
    /// Detect file kind from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "html" => Some(Self::Markup),
            "css" => Some(Self::Stylesheet),
            "js" => Some(Self::Script),
            e if GENERIC_TEXT_EXTENSIONS.contains(&e) => Some(Self::GenericText),
            e if MEDIA_EXTENSIONS.contains(&e) => Some(Self::Media),
            _ => None,
        }
    }

    /// Detect file kind from file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Markup, stylesheet and script are linked via `link`/`script` elements.
    #[inline]
    pub fn is_basic(self) -> bool {
        matches!(self, Self::Markup | Self::Stylesheet | Self::Script)
    }

    /// Display name for this file kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::GenericText => "generic-text",
            Self::Media => "media",
        }
    }
}
