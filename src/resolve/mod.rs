//! Address resolution: request path + routing mode -> record -> response body.
//!
//! | Route                        | normal | hybrid | secure                    |
//! |------------------------------|--------|--------|---------------------------|
//! | `/e/:address`                | yes    | yes    | yes, author = subdomain   |
//! | `/p/:identity/d/*identifier` | yes    | yes    | no                        |
//! | `/d/*identifier`             | no     | yes    | yes                       |

mod route;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::core::{ContentTypeSource, PayloadEncoding, RecordKind};
use crate::record::address::{Address, decode_npub};
use crate::record::{Filter, Record, decode_hex32};
use crate::relay::{RelayError, RelayPool};

pub use route::{Route, subdomain};

/// How request paths map to lookups.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Record ids and `/p/` path pairs.
    #[default]
    Normal,
    /// Everything in normal mode plus subdomain identifiers.
    Hybrid,
    /// Subdomain-bound: every lookup is constrained to the subdomain author.
    Secure,
}

impl RoutingMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Hybrid => "hybrid",
            Self::Secure => "secure",
        }
    }
}

/// Resolution failures, each mapping to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("record has no `type` tag")]
    ContentTypeMissing,

    #[error("no relay could be reached")]
    Unavailable,

    #[error("failed to decode record content: {0}")]
    Decode(String),
}

impl ResolveError {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) | Self::ContentTypeMissing => 404,
            Self::Unavailable => 503,
            Self::Decode(_) => 500,
        }
    }
}

/// What to ask the relays for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Immutable record by id.
    Id {
        id: String,
        hints: Vec<String>,
        author: Option<String>,
    },
    /// Latest mutable record for (author, identifier).
    Identifier { author: String, identifier: String },
}

impl Lookup {
    pub fn filter(&self) -> Filter {
        match self {
            Self::Id { id, author, .. } => {
                let filter = Filter::new().kinds(&RecordKind::IMMUTABLE_SERVABLE).id(id);
                match author {
                    Some(author) => filter.author(author),
                    None => filter,
                }
            }
            Self::Identifier { author, identifier } => Filter::new()
                .kinds(&RecordKind::MUTABLE_SERVABLE)
                .author(author)
                .identifier(identifier),
        }
    }

    fn hints(&self) -> &[String] {
        match self {
            Self::Id { hints, .. } => hints,
            Self::Identifier { .. } => &[],
        }
    }
}

/// Response body recovered from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub content_type: String,
    pub body: Vec<u8>,
    pub record_id: String,
}

/// Stateless read path over a relay pool.
pub struct Resolver {
    pool: Arc<RelayPool>,
    mode: RoutingMode,
}

impl Resolver {
    pub fn new(pool: Arc<RelayPool>, mode: RoutingMode) -> Self {
        Self { pool, mode }
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn pool(&self) -> &Arc<RelayPool> {
        &self.pool
    }

    /// Turn a content route into a lookup under the current mode.
    pub fn lookup(&self, route: &Route<'_>, host: Option<&str>) -> Result<Lookup, ResolveError> {
        match (route, self.mode) {
            (Route::Record(address), mode) => {
                let author = match mode {
                    RoutingMode::Secure => Some(self.host_author(host)?),
                    _ => None,
                };
                let (id, hints) = parse_address(address)?;
                Ok(Lookup::Id { id, hints, author })
            }
            (Route::PathPair { .. }, RoutingMode::Secure) => Err(ResolveError::NotFound(
                "path-pair routes are disabled in secure mode".into(),
            )),
            (
                Route::PathPair {
                    identity,
                    identifier,
                },
                _,
            ) => Ok(Lookup::Identifier {
                author: parse_identity(identity)?,
                identifier: identifier.to_string(),
            }),
            (Route::Subdomain { .. }, RoutingMode::Normal) => Err(ResolveError::NotFound(
                "subdomain routes are disabled in normal mode".into(),
            )),
            (Route::Subdomain { identifier }, _) => Ok(Lookup::Identifier {
                author: self.host_author(host)?,
                identifier: identifier.to_string(),
            }),
            (Route::Health | Route::Unknown, _) => {
                Err(ResolveError::NotFound("no such route".into()))
            }
        }
    }

    /// Author encoded in the request host's first label.
    fn host_author(&self, host: Option<&str>) -> Result<String, ResolveError> {
        let label = host
            .and_then(subdomain)
            .ok_or_else(|| ResolveError::BadRequest("request host has no npub subdomain".into()))?;
        decode_npub(label)
            .map(hex::encode)
            .map_err(|e| ResolveError::BadRequest(format!("subdomain `{label}`: {e}")))
    }

    /// Resolve a request path into a response body.
    pub async fn resolve(&self, path: &str, host: Option<&str>) -> Result<Resolved, ResolveError> {
        let route = Route::parse(path);
        let lookup = self.lookup(&route, host)?;
        let filter = lookup.filter();

        let record = match self.pool.query_latest(&filter, lookup.hints()).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(ResolveError::NotFound(format!("no record for {path}"))),
            Err(RelayError::Unreachable) => return Err(ResolveError::Unavailable),
            Err(e) => return Err(ResolveError::NotFound(e.to_string())),
        };
        decode_record(record)
    }
}

/// `nevent`/`note` pointer or 64-hex id -> (id, relay hints).
fn parse_address(address: &str) -> Result<(String, Vec<String>), ResolveError> {
    if decode_hex32(address).is_some() {
        return Ok((address.to_ascii_lowercase(), Vec::new()));
    }
    match Address::parse(address) {
        Ok(Address::Event(pointer)) => Ok((pointer.id, pointer.relays)),
        Ok(Address::Note(id)) => Ok((id, Vec::new())),
        Ok(Address::Public(_)) => Err(ResolveError::BadRequest(
            "expected a record address, found a public key".into(),
        )),
        Err(e) => Err(ResolveError::BadRequest(format!("address `{address}`: {e}"))),
    }
}

/// `npub` or 64-hex public key -> hex.
fn parse_identity(identity: &str) -> Result<String, ResolveError> {
    if decode_hex32(identity).is_some() {
        return Ok(identity.to_ascii_lowercase());
    }
    decode_npub(identity)
        .map(hex::encode)
        .map_err(|e| ResolveError::BadRequest(format!("identity `{identity}`: {e}")))
}

/// Map kind to content type and decode the payload.
pub fn decode_record(record: Record) -> Result<Resolved, ResolveError> {
    let kind = record
        .record_kind()
        .ok_or_else(|| ResolveError::NotFound(format!("unsupported kind {}", record.kind)))?;

    let content_type = match kind.content_type() {
        ContentTypeSource::Fixed(mime) => mime.to_string(),
        ContentTypeSource::TypeTag => record
            .tags
            .get("type")
            .filter(|t| !t.is_empty())
            .ok_or(ResolveError::ContentTypeMissing)?
            .to_string(),
        ContentTypeSource::NotServable => {
            return Err(ResolveError::NotFound(format!("kind {kind} is not servable")));
        }
    };

    let body = match kind.encoding() {
        PayloadEncoding::Raw => record.content.into_bytes(),
        PayloadEncoding::Base64 => STANDARD
            .decode(record.content.trim())
            .map_err(|e| ResolveError::Decode(e.to_string()))?,
    };

    Ok(Resolved {
        content_type,
        body,
        record_id: record.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::address::{EventPointer, encode_note, encode_npub};
    use crate::record::{Keys, RecordBuilder, Tags};
    use crate::relay::memory::MemoryNetwork;

    const RELAY: &str = "wss://relay.test";

    struct Fixture {
        network: Arc<MemoryNetwork>,
        keys: Keys,
    }

    impl Fixture {
        fn new() -> Self {
            let network = MemoryNetwork::new();
            network.add_relay(RELAY);
            Self {
                network,
                keys: Keys::generate(),
            }
        }

        fn store(&self, content: &str, kind: RecordKind, tags: Tags) -> Record {
            let record = RecordBuilder::new(&self.keys)
                .build(content.into(), kind, tags)
                .unwrap();
            self.network.relay(RELAY).unwrap().insert(record.clone());
            record
        }

        fn resolver(&self, mode: RoutingMode) -> Resolver {
            let pool = RelayPool::new(self.network.transport(), vec![RELAY.into()]);
            Resolver::new(Arc::new(pool), mode)
        }

        fn npub(&self) -> String {
            encode_npub(&self.keys.public_bytes()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_resolve_immutable_by_hex_and_pointer() {
        let fx = Fixture::new();
        let record = fx.store("<h1>hi</h1>", RecordKind::MarkupImmutable, Tags::new());
        let resolver = fx.resolver(RoutingMode::Normal);

        let by_hex = resolver.resolve(&format!("/e/{}", record.id), None).await.unwrap();
        assert_eq!(by_hex.content_type, "text/html; charset=utf-8");
        assert_eq!(by_hex.body, b"<h1>hi</h1>");

        let note = encode_note(&record.id).unwrap();
        let by_note = resolver.resolve(&format!("/e/{note}"), None).await.unwrap();
        assert_eq!(by_note.record_id, record.id);
    }

    #[tokio::test]
    async fn test_resolve_pointer_relay_hints() {
        let fx = Fixture::new();
        let hinted = fx.network.add_relay("wss://hinted.test");
        let record = RecordBuilder::new(&fx.keys)
            .build("a{}".into(), RecordKind::StyleImmutable, Tags::new())
            .unwrap();
        hinted.insert(record.clone());

        let pointer = EventPointer {
            id: record.id.clone(),
            relays: vec!["wss://hinted.test".into()],
            author: Some(fx.keys.public_hex()),
            kind: None,
        }
        .encode()
        .unwrap();
        let resolved = fx
            .resolver(RoutingMode::Normal)
            .resolve(&format!("/e/{pointer}"), None)
            .await
            .unwrap();
        assert_eq!(resolved.content_type, "text/css; charset=utf-8");
    }

    #[tokio::test]
    async fn test_resolve_generic_base64_roundtrip() {
        let fx = Fixture::new();
        let payload = b"{\"a\":[1,2,3]}\n\x00\xff";
        let record = fx.store(
            &STANDARD.encode(payload),
            RecordKind::GenericImmutable,
            Tags::new().with("type", "application/json"),
        );
        let resolved = fx
            .resolver(RoutingMode::Normal)
            .resolve(&format!("/e/{}", record.id), None)
            .await
            .unwrap();
        assert_eq!(resolved.content_type, "application/json");
        assert_eq!(resolved.body, payload);
    }

    #[tokio::test]
    async fn test_generic_without_type_tag_is_not_found() {
        let fx = Fixture::new();
        let record = fx.store("aGk=", RecordKind::GenericImmutable, Tags::new());
        let err = fx
            .resolver(RoutingMode::Normal)
            .resolve(&format!("/e/{}", record.id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ContentTypeMissing));
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_invalid_base64_is_internal_error() {
        let fx = Fixture::new();
        let record = fx.store(
            "not base64!!",
            RecordKind::GenericImmutable,
            Tags::new().with("type", "text/plain"),
        );
        let err = fx
            .resolver(RoutingMode::Normal)
            .resolve(&format!("/e/{}", record.id), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn test_path_pair_latest_wins() {
        let fx = Fixture::new();
        let old = fx.store("v1", RecordKind::MarkupMutable, Tags::new().with("d", "site"));
        let newer = RecordBuilder::with_clock(&fx.keys, crate::record::Clock::after(old.created_at))
            .build("v2".into(), RecordKind::MarkupMutable, Tags::new().with("d", "site"))
            .unwrap();
        fx.network.relay(RELAY).unwrap().insert(newer);

        let resolver = fx.resolver(RoutingMode::Normal);
        for identity in [fx.npub(), fx.keys.public_hex()] {
            let resolved = resolver
                .resolve(&format!("/p/{identity}/d/site"), None)
                .await
                .unwrap();
            assert_eq!(resolved.body, b"v2");
        }
    }

    #[tokio::test]
    async fn test_unknown_identifier_not_found() {
        let fx = Fixture::new();
        fx.store("v1", RecordKind::MarkupMutable, Tags::new().with("d", "site"));
        let err = fx
            .resolver(RoutingMode::Normal)
            .resolve(&format!("/p/{}/d/other", fx.npub()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_addresses_are_bad_requests() {
        let fx = Fixture::new();
        let resolver = fx.resolver(RoutingMode::Normal);
        for path in ["/e/zzzz", "/e/nevent1qqqq", "/p/not-a-key/d/site"] {
            let err = resolver.resolve(path, None).await.unwrap_err();
            assert_eq!(err.status(), 400, "{path}");
        }
        let npub = fx.npub();
        let err = resolver.resolve(&format!("/e/{npub}"), None).await.unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_mode_route_gating() {
        let fx = Fixture::new();
        fx.store("v", RecordKind::MarkupMutable, Tags::new().with("d", "site"));
        let host = format!("{}.example.com", fx.npub());

        let normal = fx.resolver(RoutingMode::Normal);
        let err = normal.resolve("/d/site", Some(&host)).await.unwrap_err();
        assert_eq!(err.status(), 404);

        let secure = fx.resolver(RoutingMode::Secure);
        let pair = format!("/p/{}/d/site", fx.npub());
        assert_eq!(secure.resolve(&pair, Some(&host)).await.unwrap_err().status(), 404);
        assert_eq!(secure.resolve("/d/site", Some(&host)).await.unwrap().body, b"v");

        let hybrid = fx.resolver(RoutingMode::Hybrid);
        assert!(hybrid.resolve(&pair, None).await.is_ok());
        assert!(hybrid.resolve("/d/site", Some(&host)).await.is_ok());
    }

    #[tokio::test]
    async fn test_secure_mode_constrains_author() {
        let fx = Fixture::new();
        let record = fx.store("x", RecordKind::ScriptImmutable, Tags::new());
        let resolver = fx.resolver(RoutingMode::Secure);
        let path = format!("/e/{}", record.id);

        let own_host = format!("{}.example.com", fx.npub());
        assert!(resolver.resolve(&path, Some(&own_host)).await.is_ok());

        let stranger = encode_npub(&Keys::generate().public_bytes()).unwrap();
        let other_host = format!("{stranger}.example.com");
        let err = resolver.resolve(&path, Some(&other_host)).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));

        let err = resolver.resolve(&path, Some("example.com")).await.unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_all_relays_down_is_unavailable() {
        let fx = Fixture::new();
        let record = fx.store("x", RecordKind::MarkupImmutable, Tags::new());
        fx.network.relay(RELAY).unwrap().set_online(false);
        let err = fx
            .resolver(RoutingMode::Normal)
            .resolve(&format!("/e/{}", record.id), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 503);
    }

    #[test]
    fn test_lookup_filters() {
        let by_id = Lookup::Id {
            id: "ab".into(),
            hints: vec![],
            author: Some("cd".into()),
        };
        let filter = by_id.filter();
        assert_eq!(filter.ids, ["ab"]);
        assert_eq!(filter.authors, ["cd"]);
        assert_eq!(filter.kinds, [5392, 5393, 5394, 1064]);

        let by_identifier = Lookup::Identifier {
            author: "cd".into(),
            identifier: "site/a.css".into(),
        };
        let filter = by_identifier.filter();
        assert_eq!(filter.kinds, [35392, 35393, 35394, 30064]);
        assert_eq!(filter.identifiers, ["site/a.css"]);
    }
}
