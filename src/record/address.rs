//! Bech32 address encodings: `npub`, `nsec`, `note` and TLV `nevent`.
//!
//! `nevent` TLV entries:
//!
//! | Type | Meaning | Value |
//! |------|---------|-------|
//! | 0    | record id | 32 bytes |
//! | 1    | relay hint | ascii url, repeatable |
//! | 2    | author | 32 bytes |
//! | 3    | kind | u32 big-endian |

use bech32::{Bech32, Hrp};

use super::keys::decode_hex32;

/// Bech32 decoding/encoding failures.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("invalid bech32: {0}")]
    Bech32(String),

    #[error("expected `{expected}` prefix, found `{found}`")]
    UnexpectedPrefix { expected: &'static str, found: String },

    #[error("expected 32 bytes, found {0}")]
    InvalidLength(usize),

    #[error("malformed TLV entry")]
    MalformedTlv,

    #[error("pointer has no record id")]
    MissingId,

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const NPUB: &str = "npub";
const NSEC: &str = "nsec";
const NOTE: &str = "note";
const NEVENT: &str = "nevent";

const TLV_ID: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

/// Decoded portable pointer to an immutable record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventPointer {
    /// Record id, hex.
    pub id: String,
    /// Relay hints to query in addition to the configured relays.
    pub relays: Vec<String>,
    /// Author public key, hex.
    pub author: Option<String>,
    pub kind: Option<u32>,
}

impl EventPointer {
    pub fn encode(&self) -> Result<String, AddressError> {
        let mut data = Vec::with_capacity(34 + 34);
        push_tlv(&mut data, TLV_ID, &hex32(&self.id)?);
        for relay in &self.relays {
            // Longer hints cannot be represented in a single-byte length.
            if relay.len() <= usize::from(u8::MAX) {
                push_tlv(&mut data, TLV_RELAY, relay.as_bytes());
            }
        }
        if let Some(author) = &self.author {
            push_tlv(&mut data, TLV_AUTHOR, &hex32(author)?);
        }
        if let Some(kind) = self.kind {
            push_tlv(&mut data, TLV_KIND, &kind.to_be_bytes());
        }
        encode(NEVENT, &data)
    }

    pub fn decode(input: &str) -> Result<Self, AddressError> {
        let data = decode(NEVENT, input)?;
        let mut pointer = Self::default();
        let mut id = None;
        let mut rest = data.as_slice();

        while !rest.is_empty() {
            let [tag, len, tail @ ..] = rest else {
                return Err(AddressError::MalformedTlv);
            };
            let len = usize::from(*len);
            if tail.len() < len {
                return Err(AddressError::MalformedTlv);
            }
            let (value, next) = tail.split_at(len);
            match *tag {
                TLV_ID => id = Some(to_hex32(value)?),
                TLV_RELAY => {
                    let relay =
                        std::str::from_utf8(value).map_err(|_| AddressError::MalformedTlv)?;
                    pointer.relays.push(relay.to_owned());
                }
                TLV_AUTHOR => pointer.author = Some(to_hex32(value)?),
                TLV_KIND => {
                    let bytes: [u8; 4] =
                        value.try_into().map_err(|_| AddressError::MalformedTlv)?;
                    pointer.kind = Some(u32::from_be_bytes(bytes));
                }
                // Unknown entries are skipped.
                _ => {}
            }
            rest = next;
        }

        pointer.id = id.ok_or(AddressError::MissingId)?;
        Ok(pointer)
    }
}

/// Any address accepted from users or requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Public(String),
    Note(String),
    Event(EventPointer),
}

impl Address {
    /// Parse an `npub`, `note` or `nevent` string.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let prefix = input.split('1').next().unwrap_or_default().to_ascii_lowercase();
        match prefix.as_str() {
            NPUB => Ok(Self::Public(hex::encode(decode_npub(input)?))),
            NOTE => Ok(Self::Note(hex::encode(decode32(NOTE, input)?))),
            NEVENT => Ok(Self::Event(EventPointer::decode(input)?)),
            _ => Err(AddressError::UnexpectedPrefix {
                expected: "npub, note or nevent",
                found: prefix,
            }),
        }
    }
}

pub fn encode_npub(pubkey: &[u8; 32]) -> Result<String, AddressError> {
    encode(NPUB, pubkey)
}

pub fn decode_npub(input: &str) -> Result<[u8; 32], AddressError> {
    decode32(NPUB, input)
}

pub fn encode_nsec(secret: &[u8; 32]) -> Result<String, AddressError> {
    encode(NSEC, secret)
}

pub fn decode_nsec(input: &str) -> Result<[u8; 32], AddressError> {
    decode32(NSEC, input)
}

pub fn encode_note(id_hex: &str) -> Result<String, AddressError> {
    encode(NOTE, &hex32(id_hex)?)
}

// =============================================================================
// Helpers
// =============================================================================

fn push_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    // Callers guarantee value.len() <= 255.
    out.push(value.len() as u8);
    out.extend_from_slice(value);
}

fn encode(prefix: &str, data: &[u8]) -> Result<String, AddressError> {
    let hrp = Hrp::parse(prefix).map_err(|e| AddressError::Bech32(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| AddressError::Bech32(e.to_string()))
}

fn decode(expected: &'static str, input: &str) -> Result<Vec<u8>, AddressError> {
    let (hrp, data) =
        bech32::decode(input.trim()).map_err(|e| AddressError::Bech32(e.to_string()))?;
    let found = hrp.to_lowercase();
    if found != expected {
        return Err(AddressError::UnexpectedPrefix { expected, found });
    }
    Ok(data)
}

fn decode32(expected: &'static str, input: &str) -> Result<[u8; 32], AddressError> {
    let data = decode(expected, input)?;
    data.as_slice()
        .try_into()
        .map_err(|_| AddressError::InvalidLength(data.len()))
}

fn hex32(input: &str) -> Result<[u8; 32], AddressError> {
    decode_hex32(input).ok_or_else(|| AddressError::InvalidHex(input.to_owned()))
}

fn to_hex32(value: &[u8]) -> Result<String, AddressError> {
    if value.len() != 32 {
        return Err(AddressError::InvalidLength(value.len()));
    }
    Ok(hex::encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIP-19 reference vector.
    const NPUB_VECTOR: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";
    const NPUB_HEX: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

    const ID: &str = "b9f5441e45ca39179320e0031cfb18e34078673dcc3d3e3a3b3a981760aa5696";

    #[test]
    fn test_npub_vector() {
        let bytes = decode_npub(NPUB_VECTOR).unwrap();
        assert_eq!(hex::encode(bytes), NPUB_HEX);
        assert_eq!(encode_npub(&bytes).unwrap(), NPUB_VECTOR);
    }

    #[test]
    fn test_wrong_prefix_rejected() {
        let note = encode_note(ID).unwrap();
        assert!(matches!(
            decode_npub(&note),
            Err(AddressError::UnexpectedPrefix { expected: "npub", .. })
        ));
    }

    #[test]
    fn test_nevent_with_relays_and_author() {
        let pointer = EventPointer {
            id: ID.into(),
            relays: vec!["wss://relay.one".into(), "wss://relay.two".into()],
            author: Some(NPUB_HEX.into()),
            kind: Some(5392),
        };
        let encoded = pointer.encode().unwrap();
        assert!(encoded.starts_with("nevent1"));
        assert_eq!(EventPointer::decode(&encoded).unwrap(), pointer);
    }

    #[test]
    fn test_nevent_skips_unknown_tlv() {
        let mut data = Vec::new();
        push_tlv(&mut data, 9, b"ignored");
        push_tlv(&mut data, TLV_ID, &hex32(ID).unwrap());
        let encoded = encode(NEVENT, &data).unwrap();
        let pointer = EventPointer::decode(&encoded).unwrap();
        assert_eq!(pointer.id, ID);
        assert!(pointer.relays.is_empty());
    }

    #[test]
    fn test_nevent_without_id() {
        let mut data = Vec::new();
        push_tlv(&mut data, TLV_RELAY, b"wss://r");
        let encoded = encode(NEVENT, &data).unwrap();
        assert!(matches!(
            EventPointer::decode(&encoded),
            Err(AddressError::MissingId)
        ));
    }

    #[test]
    fn test_address_parse() {
        assert_eq!(
            Address::parse(NPUB_VECTOR).unwrap(),
            Address::Public(NPUB_HEX.into())
        );
        let note = encode_note(ID).unwrap();
        assert_eq!(Address::parse(&note).unwrap(), Address::Note(ID.into()));
        assert!(Address::parse("hello").is_err());
    }
}
