//! Site directory scanning.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::SiteAsset;
use crate::core::FileKind;

/// Scan failures. Any of them aborts the deploy.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("site directory `{0}` does not exist")]
    MissingRoot(PathBuf),

    #[error("failed to walk `{path}`: {message}")]
    Walk { path: PathBuf, message: String },
}

/// Walk `root` recursively and classify every regular file by suffix.
///
/// Files with unknown suffixes are skipped. Results are sorted by relative
/// path so repeated scans of the same tree are identical.
pub fn scan(root: &Path) -> Result<Vec<SiteAsset>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let mut assets = Vec::new();
    for entry in WalkDir::new(root).sort(true) {
        let entry = entry.map_err(|e| ScanError::Walk {
            path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let source = entry.path();
        let Some(kind) = FileKind::from_path(&source) else {
            continue;
        };
        let rel = source.strip_prefix(root).unwrap_or(&source).to_path_buf();
        assets.push(SiteAsset {
            source,
            rel,
            kind,
            referenced: false,
        });
    }

    assets.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = scan(&dir.path().join("nope"));
        assert!(matches!(result, Err(ScanError::MissingRoot(_))));
    }

    #[test]
    fn test_scan_empty() {
        let dir = TempDir::new().unwrap();
        assert!(scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_classifies_and_sorts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("css")).unwrap();
        fs::create_dir_all(root.join("media/clips")).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("css/style.css"), "body{}").unwrap();
        fs::write(root.join("app.js"), "1").unwrap();
        fs::write(root.join("data.JSON"), "{}").unwrap();
        fs::write(root.join("media/clips/intro.webm"), [0u8; 4]).unwrap();
        fs::write(root.join("README.md"), "ignored").unwrap();
        fs::write(root.join("Makefile"), "ignored").unwrap();

        let assets = scan(root).unwrap();
        let found: Vec<_> = assets
            .iter()
            .map(|a| (a.site_path(), a.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                ("app.js".to_string(), FileKind::Script),
                ("css/style.css".to_string(), FileKind::Stylesheet),
                ("data.JSON".to_string(), FileKind::GenericText),
                ("index.html".to_string(), FileKind::Markup),
                ("media/clips/intro.webm".to_string(), FileKind::Media),
            ]
        );
        assert!(assets.iter().all(|a| !a.referenced));
    }
}
