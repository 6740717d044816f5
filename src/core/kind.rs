//! Record kinds and their per-variant behaviour.
//!
//! | Variant            | Number | Content-Type                 | Payload |
//! |--------------------|--------|------------------------------|---------|
//! | `MarkupImmutable`  | 5392   | `text/html; charset=utf-8`   | raw     |
//! | `StyleImmutable`   | 5393   | `text/css; charset=utf-8`    | raw     |
//! | `ScriptImmutable`  | 5394   | `text/javascript; ...`       | raw     |
//! | `MarkupMutable`    | 35392  | `text/html; charset=utf-8`   | raw     |
//! | `StyleMutable`     | 35393  | `text/css; charset=utf-8`    | raw     |
//! | `ScriptMutable`    | 35394  | `text/javascript; ...`       | raw     |
//! | `GenericImmutable` | 1064   | `type` tag                   | base64  |
//! | `GenericMutable`   | 30064  | `type` tag                   | base64  |
//! | `UploadAuth`       | 27235  | -                            | -       |

use super::FileKind;
use crate::utils::mime::types;

/// How the HTTP content type of a record is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeSource {
    /// Fixed MIME string.
    Fixed(&'static str),
    /// Value of the record's `type` tag.
    TypeTag,
    /// Record is never served.
    NotServable,
}

/// How a record's content is turned back into response bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Content is the payload.
    Raw,
    /// Content is standard base64 of the payload.
    Base64,
}

/// Closed set of record kinds understood by the publisher and resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    MarkupImmutable,
    StyleImmutable,
    ScriptImmutable,
    MarkupMutable,
    StyleMutable,
    ScriptMutable,
    GenericImmutable,
    GenericMutable,
    /// HTTP authorization record for the media upload service.
    UploadAuth,
}

impl RecordKind {
    /// Kinds addressed by record id.
    pub const IMMUTABLE_SERVABLE: [Self; 4] = [
        Self::MarkupImmutable,
        Self::StyleImmutable,
        Self::ScriptImmutable,
        Self::GenericImmutable,
    ];

    /// Kinds addressed by (author, kind, identifier).
    pub const MUTABLE_SERVABLE: [Self; 4] = [
        Self::MarkupMutable,
        Self::StyleMutable,
        Self::ScriptMutable,
        Self::GenericMutable,
    ];

    /// Select the kind for a published file.
    ///
    /// Returns `None` for media, which is uploaded instead of published.
    pub fn for_file(kind: FileKind, mutable: bool) -> Option<Self> {
        let kind = match (kind, mutable) {
            (FileKind::Markup, false) => Self::MarkupImmutable,
            (FileKind::Markup, true) => Self::MarkupMutable,
            (FileKind::Stylesheet, false) => Self::StyleImmutable,
            (FileKind::Stylesheet, true) => Self::StyleMutable,
            (FileKind::Script, false) => Self::ScriptImmutable,
            (FileKind::Script, true) => Self::ScriptMutable,
            (FileKind::GenericText, false) => Self::GenericImmutable,
            (FileKind::GenericText, true) => Self::GenericMutable,
            (FileKind::Media, _) => return None,
        };
        Some(kind)
    }

    /// Numeric kind on the wire.
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::MarkupImmutable => 5392,
            Self::StyleImmutable => 5393,
            Self::ScriptImmutable => 5394,
            Self::MarkupMutable => 35392,
            Self::StyleMutable => 35393,
            Self::ScriptMutable => 35394,
            Self::GenericImmutable => 1064,
            Self::GenericMutable => 30064,
            Self::UploadAuth => 27235,
        }
    }

    /// Parse a numeric kind. Unknown numbers yield `None`.
    pub const fn from_u16(kind: u16) -> Option<Self> {
        let kind = match kind {
            5392 => Self::MarkupImmutable,
            5393 => Self::StyleImmutable,
            5394 => Self::ScriptImmutable,
            35392 => Self::MarkupMutable,
            35393 => Self::StyleMutable,
            35394 => Self::ScriptMutable,
            1064 => Self::GenericImmutable,
            30064 => Self::GenericMutable,
            27235 => Self::UploadAuth,
            _ => return None,
        };
        Some(kind)
    }

    /// Mutable kinds are replaceable: the newest record per identifier wins.
    pub const fn is_mutable(self) -> bool {
        matches!(
            self,
            Self::MarkupMutable | Self::StyleMutable | Self::ScriptMutable | Self::GenericMutable
        )
    }

    pub const fn content_type(self) -> ContentTypeSource {
        match self {
            Self::MarkupImmutable | Self::MarkupMutable => ContentTypeSource::Fixed(types::HTML),
            Self::StyleImmutable | Self::StyleMutable => ContentTypeSource::Fixed(types::CSS),
            Self::ScriptImmutable | Self::ScriptMutable => {
                ContentTypeSource::Fixed(types::JAVASCRIPT)
            }
            Self::GenericImmutable | Self::GenericMutable => ContentTypeSource::TypeTag,
            Self::UploadAuth => ContentTypeSource::NotServable,
        }
    }

    pub const fn encoding(self) -> PayloadEncoding {
        match self {
            Self::GenericImmutable | Self::GenericMutable => PayloadEncoding::Base64,
            _ => PayloadEncoding::Raw,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
