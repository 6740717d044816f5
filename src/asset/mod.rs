//! Site files: discovery and lookup.

mod scan;

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::core::FileKind;

pub use scan::{ScanError, scan};

/// A classified file under the site directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteAsset {
    /// Absolute (or site-dir-joined) source path.
    pub source: PathBuf,
    /// Path relative to the site root.
    pub rel: PathBuf,
    pub kind: FileKind,
    /// Set once a markup reference to this file was seen.
    pub referenced: bool,
}

impl SiteAsset {
    /// Relative path with `/` separators, as used in identifiers and URLs.
    pub fn site_path(&self) -> String {
        to_site_path(&self.rel)
    }

    /// Read the file contents.
    pub fn load(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.source)
    }
}

/// Join path components with `/` regardless of platform.
pub fn to_site_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Scanned assets keyed by site path.
#[derive(Debug, Default)]
pub struct AssetIndex {
    assets: FxHashMap<String, SiteAsset>,
}

impl AssetIndex {
    pub fn new(assets: Vec<SiteAsset>) -> Self {
        let assets = assets
            .into_iter()
            .map(|asset| (asset.site_path(), asset))
            .collect();
        Self { assets }
    }

    /// Mark an asset referenced, returning it.
    pub fn mark_referenced(&mut self, rel: &Path) -> Option<&SiteAsset> {
        let asset = self.assets.get_mut(&to_site_path(rel))?;
        asset.referenced = true;
        Some(asset)
    }

    /// Assets of `kind`, sorted by site path.
    pub fn of_kind(&self, kind: FileKind) -> Vec<&SiteAsset> {
        let mut out: Vec<_> = self.assets.values().filter(|a| a.kind == kind).collect();
        out.sort_by(|a, b| a.rel.cmp(&b.rel));
        out
    }

    /// Site paths no reference reached, sorted.
    pub fn unreferenced(&self) -> Vec<&str> {
        let mut out: Vec<_> = self
            .assets
            .iter()
            .filter(|(_, asset)| !asset.referenced)
            .map(|(path, _)| path.as_str())
            .collect();
        out.sort_unstable();
        out
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(rel: &str, kind: FileKind) -> SiteAsset {
        SiteAsset {
            source: Path::new("/site").join(rel),
            rel: PathBuf::from(rel),
            kind,
            referenced: false,
        }
    }

    #[test]
    fn test_index_lookup_and_mark() {
        let mut index = AssetIndex::new(vec![
            asset("css/a.css", FileKind::Stylesheet),
            asset("logo.png", FileKind::Media),
        ]);
        assert_eq!(index.len(), 2);
        assert!(index.mark_referenced(Path::new("css/b.css")).is_none());

        let logo = index.mark_referenced(Path::new("logo.png")).unwrap();
        assert!(logo.referenced);
        assert_eq!(index.unreferenced(), ["css/a.css"]);
        assert_eq!(index.of_kind(FileKind::Media).len(), 1);
    }

    #[test]
    fn test_site_path_uses_forward_slashes() {
        let a = asset("img/icons/x.svg", FileKind::GenericText);
        assert_eq!(a.site_path(), "img/icons/x.svg");
    }
}
