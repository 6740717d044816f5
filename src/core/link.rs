//! Link classification for references found in site markup.

use std::path::{Component, Path, PathBuf};

/// Syntactic classification of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind<'a> {
    /// Absolute URL with scheme and host (`https://cdn.example/app.js`).
    External(&'a str),
    /// Scheme without host (`mailto:`, `data:`), never a site file.
    Opaque(&'a str),
    /// Pure fragment (`#top`). Value is the anchor without `#`.
    Fragment(&'a str),
    /// Path into the site directory, query and fragment removed.
    Local(&'a str),
}

impl<'a> LinkKind<'a> {
    /// Parse a link string into its syntactic kind.
    pub fn parse(link: &'a str) -> Self {
        let link = link.trim();
        if let Some(anchor) = link.strip_prefix('#') {
            return Self::Fragment(anchor);
        }
        if link.starts_with("//") {
            // Protocol-relative URL always names a host.
            return Self::External(link);
        }
        if let Ok(url) = url::Url::parse(link) {
            return if url.host_str().is_some_and(|host| !host.is_empty()) {
                Self::External(link)
            } else {
                Self::Opaque(link)
            };
        }
        let path = link.split(['?', '#']).next().unwrap_or_default();
        Self::Local(path)
    }

    /// Site-relative path for a local link, normalized against the site root.
    ///
    /// `./css/a.css`, `/css/a.css` and `css/./a.css` all yield `css/a.css`.
    /// Returns `None` for non-local links and for paths escaping the root.
    pub fn site_path(self) -> Option<PathBuf> {
        let Self::Local(path) = self else {
            return None;
        };
        normalize(Path::new(path))
    }
}

/// Resolve `.` and `..` components and drop leading separators.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_external() {
        assert!(matches!(
            LinkKind::parse("https://example.com/app.js"),
            LinkKind::External(_)
        ));
        assert!(matches!(
            LinkKind::parse("//cdn.example.com/a.css"),
            LinkKind::External(_)
        ));
    }

    #[test]
    fn test_parse_opaque() {
        assert!(matches!(
            LinkKind::parse("mailto:user@example.com"),
            LinkKind::Opaque(_)
        ));
        assert!(matches!(
            LinkKind::parse("data:image/png;base64,AAAA"),
            LinkKind::Opaque(_)
        ));
    }

    #[test]
    fn test_parse_fragment() {
        assert_eq!(LinkKind::parse("#section"), LinkKind::Fragment("section"));
        assert_eq!(LinkKind::parse("#"), LinkKind::Fragment(""));
    }

    #[test]
    fn test_parse_local_strips_query() {
        assert_eq!(
            LinkKind::parse("./style.css?v=1#x"),
            LinkKind::Local("./style.css")
        );
        assert_eq!(LinkKind::parse("/img/logo.png"), LinkKind::Local("/img/logo.png"));
    }

    #[test]
    fn test_site_path() {
        let expected = Some(PathBuf::from("css/a.css"));
        assert_eq!(LinkKind::parse("./css/a.css").site_path(), expected);
        assert_eq!(LinkKind::parse("/css/a.css").site_path(), expected);
        assert_eq!(LinkKind::parse("css/./x/../a.css").site_path(), expected);
        assert_eq!(LinkKind::parse("../outside.css").site_path(), None);
        assert_eq!(LinkKind::parse("https://a.b/c.css").site_path(), None);
        assert_eq!(LinkKind::parse("./").site_path(), None);
    }
}
