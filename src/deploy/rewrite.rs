//! Link rewriting: local references in the root markup become record
//! addresses (text assets) or remote URLs (media).

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;

use super::queue::PublishQueue;
use super::upload::AttrTarget;
use crate::asset::{AssetIndex, SiteAsset};
use crate::core::{FileKind, LinkKind, RecordKind};
use crate::html::{Document, NodeId};
use crate::record::address::EventPointer;
use crate::record::{Record, RecordBuilder, Tags};
use crate::utils::mime;

/// Attributes that may carry a file reference, in lookup order.
pub const REFERENCE_ATTRS: [&str; 3] = ["href", "src", "data"];

/// Elements whose references are uploaded as media.
pub const MEDIA_ELEMENTS: [&str; 6] = ["img", "audio", "video", "source", "object", "embed"];

/// How published records are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// `nevent` pointers carrying relay hints and author.
    Immutable { relays: Vec<String> },
    /// `<identifier>/<site path>` identifiers under the root identifier.
    Mutable { identifier: String },
}

impl Addressing {
    pub fn is_mutable(&self) -> bool {
        matches!(self, Self::Mutable { .. })
    }

    /// Identifier of a dependent asset.
    pub fn child_identifier(root: &str, site_path: &str) -> String {
        format!("{root}/{}", site_path.trim_start_matches("./").trim_start_matches('/'))
    }

    /// Address written into markup for a signed record.
    fn address_of(&self, record: &Record, site_path: &str) -> Option<String> {
        match self {
            Self::Mutable { identifier } => Some(Self::child_identifier(identifier, site_path)),
            Self::Immutable { relays } => {
                let pointer = EventPointer {
                    id: record.id.clone(),
                    relays: relays.clone(),
                    author: Some(record.pubkey.clone()),
                    kind: None,
                };
                match pointer.encode() {
                    Ok(address) => Some(address),
                    Err(e) => {
                        crate::log!("deploy"; "failed to encode pointer for {}: {}", site_path, e);
                        None
                    }
                }
            }
        }
    }
}

/// A local reference found in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub node: NodeId,
    pub attr: &'static str,
    pub rel: PathBuf,
    pub kind: FileKind,
}

/// Every local, classifiable reference in document order.
pub fn references(doc: &Document) -> Vec<Reference> {
    let mut out = Vec::new();
    for node in doc.elements() {
        for attr in REFERENCE_ATTRS {
            let Some(value) = doc.attr(node, attr) else {
                continue;
            };
            let Some(rel) = LinkKind::parse(value).site_path() else {
                continue;
            };
            let Some(kind) = FileKind::from_path(&rel) else {
                continue;
            };
            out.push(Reference {
                node,
                attr,
                rel,
                kind,
            });
        }
    }
    out
}

/// Whether `reference` sits on an element handled by the given phase.
fn element_is(doc: &Document, node: NodeId, names: &[&str]) -> bool {
    doc.element(node)
        .is_some_and(|element| names.contains(&element.name.as_str()))
}

/// Media references on media elements, grouped by site path in first-seen order.
pub fn media_targets(doc: &Document) -> Vec<(PathBuf, Vec<AttrTarget>)> {
    let mut grouped: Vec<(PathBuf, Vec<AttrTarget>)> = Vec::new();
    for reference in references(doc) {
        if reference.kind != FileKind::Media || !element_is(doc, reference.node, &MEDIA_ELEMENTS) {
            continue;
        }
        let target = (reference.node, reference.attr);
        match grouped.iter_mut().find(|(rel, _)| *rel == reference.rel) {
            Some((_, targets)) => targets.push(target),
            None => grouped.push((reference.rel, vec![target])),
        }
    }
    grouped
}

/// Script files referenced from `link`/`script` elements.
pub fn script_paths(doc: &Document) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for reference in references(doc) {
        if reference.kind == FileKind::Script
            && element_is(doc, reference.node, &["link", "script"])
            && !out.contains(&reference.rel)
        {
            out.push(reference.rel);
        }
    }
    out
}

/// Replace local media paths inside script text with uploaded URLs.
///
/// A path matches only when it starts a token (start of text, whitespace,
/// quote, `(`, `,`, `=` or `[` before it) and ends one (no word character,
/// `.` or `-` after it). `./path` and `/path` spellings are consumed with
/// the path. The text is scanned once, so emitted URLs are never matched
/// again. At each position the longest path wins.
pub fn substitute_media(script: &str, urls: &FxHashMap<String, String>) -> String {
    if urls.is_empty() {
        return script.to_owned();
    }
    let mut paths: Vec<&str> = urls.keys().map(String::as_str).collect();
    paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternatives: Vec<String> = paths.iter().map(|p| regex::escape(p)).collect();

    let pattern = format!(
        r#"(?P<lead>^|[ \t\r\n"'`(,=\[])(?:\./|/)?(?P<path>{})"#,
        alternatives.join("|")
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            crate::log!("deploy"; "media substitution skipped: {}", e);
            return script.to_owned();
        }
    };

    re.replace_all(script, |caps: &Captures| {
        let whole = &caps[0];
        let ends_token = caps.get(0).is_some_and(|m| {
            script[m.end()..]
                .chars()
                .next()
                .is_none_or(|c| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '-')))
        });
        match urls.get(&caps["path"]) {
            Some(url) if ends_token => format!("{}{url}", &caps["lead"]),
            _ => whole.to_owned(),
        }
    })
    .into_owned()
}

/// Counters reported after rewriting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    pub records: usize,
    pub rewritten: usize,
    pub missing: usize,
}

/// Turns referenced text assets into records and rewrites their references.
pub struct LinkRewriter<'a, 'k> {
    builder: &'a RecordBuilder<'k>,
    addressing: &'a Addressing,
    media_urls: &'a FxHashMap<String, String>,
    /// Site path -> address of the already published record.
    published: FxHashMap<String, String>,
}

impl<'a, 'k> LinkRewriter<'a, 'k> {
    pub fn new(
        builder: &'a RecordBuilder<'k>,
        addressing: &'a Addressing,
        media_urls: &'a FxHashMap<String, String>,
    ) -> Self {
        Self {
            builder,
            addressing,
            media_urls,
            published: FxHashMap::default(),
        }
    }

    /// Walk the tree in document order, appending one record per distinct
    /// referenced text asset to `queue` and rewriting every reference to it.
    pub fn rewrite(
        &mut self,
        doc: &mut Document,
        assets: &mut AssetIndex,
        queue: &mut PublishQueue,
    ) -> RewriteStats {
        let mut stats = RewriteStats::default();

        for reference in references(doc) {
            let handled = match reference.kind {
                kind if kind.is_basic() => element_is(doc, reference.node, &["link", "script"]),
                FileKind::GenericText => true,
                _ => false,
            };
            if !handled {
                continue;
            }

            let site_path = crate::asset::to_site_path(&reference.rel);
            if let Some(address) = self.published.get(&site_path) {
                doc.set_attr(reference.node, reference.attr, address.clone());
                stats.rewritten += 1;
                continue;
            }

            let Some(asset) = assets.mark_referenced(&reference.rel) else {
                crate::log!("deploy"; "referenced file not found: {}", site_path);
                stats.missing += 1;
                continue;
            };
            let Some(record) = self.build(asset) else {
                continue;
            };
            let Some(address) = self.addressing.address_of(&record, &site_path) else {
                continue;
            };

            crate::debug!("deploy"; "queued {} as {} ({})", site_path, reference.kind.name(), record.kind);
            queue.push(record);
            stats.records += 1;
            doc.set_attr(reference.node, reference.attr, address.clone());
            stats.rewritten += 1;
            self.published.insert(site_path, address);
        }

        stats
    }

    /// Load, encode and sign one asset. Failures are logged and skipped.
    fn build(&self, asset: &SiteAsset) -> Option<Record> {
        let site_path = asset.site_path();
        let kind = RecordKind::for_file(asset.kind, self.addressing.is_mutable())?;

        let bytes = match asset.load() {
            Ok(bytes) => bytes,
            Err(e) => {
                crate::log!("deploy"; "failed to read {}: {}", site_path, e);
                return None;
            }
        };

        let mut tags = Tags::new();
        if let Addressing::Mutable { identifier } = self.addressing {
            tags.set("d", [Addressing::child_identifier(identifier, &site_path)]);
        }

        let content = if asset.kind == FileKind::GenericText {
            tags.set("type", [mime::from_path(&asset.rel)]);
            STANDARD.encode(&bytes)
        } else {
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    crate::log!("deploy"; "{} is not valid UTF-8, skipped", site_path);
                    return None;
                }
            };
            if asset.kind == FileKind::Script && !self.media_urls.is_empty() {
                substitute_media(&text, self.media_urls)
            } else {
                text
            }
        };

        match self.builder.build(content, kind, tags) {
            Ok(record) => Some(record),
            Err(e) => {
                crate::log!("deploy"; "failed to sign {}: {}", site_path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::scan;
    use crate::record::Keys;
    use crate::record::address::Address;
    use std::fs;
    use tempfile::TempDir;

    struct Site {
        dir: TempDir,
    }

    impl Site {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            for (path, content) in files {
                let path = dir.path().join(path);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
            }
            Self { dir }
        }

        fn index(&self) -> AssetIndex {
            AssetIndex::new(scan(self.dir.path()).unwrap())
        }
    }

    fn rewrite(
        html: &str,
        site: &Site,
        addressing: &Addressing,
        media_urls: &FxHashMap<String, String>,
    ) -> (Document, PublishQueue, RewriteStats) {
        let keys = Keys::generate();
        let builder = RecordBuilder::new(&keys);
        let mut doc = Document::parse(html).unwrap();
        let mut assets = site.index();
        let mut queue = PublishQueue::new();
        let stats =
            LinkRewriter::new(&builder, addressing, media_urls).rewrite(&mut doc, &mut assets, &mut queue);
        (doc, queue, stats)
    }

    fn attr_of(doc: &Document, tag: &str, attr: &str) -> Vec<String> {
        doc.elements()
            .into_iter()
            .filter(|&id| doc.element(id).is_some_and(|e| e.name == tag))
            .filter_map(|id| doc.attr(id, attr).map(str::to_owned))
            .collect()
    }

    fn immutable() -> Addressing {
        Addressing::Immutable {
            relays: vec!["wss://relay.test".into()],
        }
    }

    #[test]
    fn test_stylesheet_becomes_pointer() {
        let site = Site::new(&[("style.css", "body{}")]);
        let (doc, queue, stats) = rewrite(
            r#"<html><head><link rel="stylesheet" href="./style.css"></head></html>"#,
            &site,
            &immutable(),
            &FxHashMap::default(),
        );

        assert_eq!(stats.records, 1);
        let record = &queue.records()[0];
        assert_eq!(record.kind, 5393);
        assert_eq!(record.content, "body{}");

        let href = &attr_of(&doc, "link", "href")[0];
        let Address::Event(pointer) = Address::parse(href).unwrap() else {
            panic!("expected nevent, got {href}");
        };
        assert_eq!(pointer.id, record.id);
        assert_eq!(pointer.relays, ["wss://relay.test"]);
        assert_eq!(pointer.author.as_deref(), Some(record.pubkey.as_str()));
    }

    #[test]
    fn test_mutable_identifiers() {
        let site = Site::new(&[("js/app.js", "run()"), ("style.css", "a{}")]);
        let addressing = Addressing::Mutable {
            identifier: "blog".into(),
        };
        let (doc, queue, _) = rewrite(
            r#"<html><head><link href="/style.css"><script src="js/app.js"></script></head></html>"#,
            &site,
            &addressing,
            &FxHashMap::default(),
        );

        assert_eq!(attr_of(&doc, "link", "href"), ["blog/style.css"]);
        assert_eq!(attr_of(&doc, "script", "src"), ["blog/js/app.js"]);
        let kinds: Vec<_> = queue.records().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, [35393, 35394]);
        assert_eq!(queue.records()[1].identifier(), Some("blog/js/app.js"));
    }

    #[test]
    fn test_duplicate_reference_single_record() {
        let site = Site::new(&[("a.css", "x")]);
        let (doc, queue, stats) = rewrite(
            r#"<html><head><link href="a.css"><link href="./a.css?v=2"></head></html>"#,
            &site,
            &immutable(),
            &FxHashMap::default(),
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(stats.rewritten, 2);
        let hrefs = attr_of(&doc, "link", "href");
        assert_eq!(hrefs[0], hrefs[1]);
    }

    #[test]
    fn test_external_and_missing_left_alone() {
        let site = Site::new(&[]);
        let html = r#"<html><head><link href="https://cdn.example/a.css"><script src="gone.js"></script></head></html>"#;
        let (doc, queue, stats) = rewrite(html, &site, &immutable(), &FxHashMap::default());
        assert!(queue.is_empty());
        assert_eq!(stats.missing, 1);
        assert_eq!(attr_of(&doc, "link", "href"), ["https://cdn.example/a.css"]);
        assert_eq!(attr_of(&doc, "script", "src"), ["gone.js"]);
    }

    #[test]
    fn test_generic_text_any_element() {
        let site = Site::new(&[("data/feed.json", "{\"a\":1}")]);
        let (doc, queue, _) = rewrite(
            r#"<html><body><a href="data/feed.json">feed</a></body></html>"#,
            &site,
            &immutable(),
            &FxHashMap::default(),
        );
        let record = &queue.records()[0];
        assert_eq!(record.kind, 1064);
        assert_eq!(record.tags.get("type"), Some("application/json"));
        assert_eq!(STANDARD.decode(&record.content).unwrap(), b"{\"a\":1}");
        assert!(attr_of(&doc, "a", "href")[0].starts_with("nevent1"));
    }

    #[test]
    fn test_basic_kinds_only_on_link_and_script() {
        let site = Site::new(&[("about.html", "<p>hi</p>")]);
        let (doc, queue, _) = rewrite(
            r#"<html><body><a href="about.html">about</a></body></html>"#,
            &site,
            &immutable(),
            &FxHashMap::default(),
        );
        assert!(queue.is_empty());
        assert_eq!(attr_of(&doc, "a", "href"), ["about.html"]);
    }

    #[test]
    fn test_scripts_get_media_urls() {
        let site = Site::new(&[("app.js", r#"img.src = "./img/logo.png";"#)]);
        let mut urls = FxHashMap::default();
        urls.insert("img/logo.png".to_owned(), "https://cdn.test/logo.png".to_owned());
        let (_, queue, _) = rewrite(
            r#"<html><head><script src="app.js"></script></head></html>"#,
            &site,
            &immutable(),
            &urls,
        );
        assert_eq!(queue.records()[0].content, r#"img.src = "https://cdn.test/logo.png";"#);
    }

    #[test]
    fn test_media_targets_grouped() {
        let doc = Document::parse(
            r#"<html><body><img src="logo.png"><video><source src="./logo.png"></video><img src="https://x.test/y.png"><a href="z.png">z</a></body></html>"#,
        )
        .unwrap();
        let targets = media_targets(&doc);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, PathBuf::from("logo.png"));
        assert_eq!(targets[0].1.len(), 2);
    }

    #[test]
    fn test_substitute_media_longest_first() {
        let mut urls = FxHashMap::default();
        urls.insert("a.png".to_owned(), "U1".to_owned());
        urls.insert("img/a.png".to_owned(), "U2".to_owned());
        assert_eq!(
            substitute_media("f('/img/a.png', 'a.png')", &urls),
            "f('U2', 'U1')"
        );
    }

    #[test]
    fn test_substitute_media_needs_token_boundary() {
        let mut urls = FxHashMap::default();
        urls.insert("a.png".to_owned(), "U".to_owned());
        assert_eq!(
            substitute_media(r#"f("banana.png"); g("a.png"); h("a.png.bak")"#, &urls),
            r#"f("banana.png"); g("U"); h("a.png.bak")"#
        );
        assert_eq!(substitute_media("a.png,a.png", &urls), "U,U");
    }

    #[test]
    fn test_substitute_media_never_rescans_urls() {
        let mut urls = FxHashMap::default();
        urls.insert(
            "img/logo.png".to_owned(),
            "https://cdn.test/img/logo.png".to_owned(),
        );
        assert_eq!(
            substitute_media(r#"a = "./img/logo.png"; b = '/img/logo.png';"#, &urls),
            r#"a = "https://cdn.test/img/logo.png"; b = 'https://cdn.test/img/logo.png';"#
        );
    }

    #[test]
    fn test_child_identifier() {
        assert_eq!(Addressing::child_identifier("site", "./css/a.css"), "site/css/a.css");
        assert_eq!(Addressing::child_identifier("site", "/a.js"), "site/a.js");
    }
}
