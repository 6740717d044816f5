//! Signing keys: BIP-340 schnorr over secp256k1.

use std::fmt;
use std::sync::LazyLock;

use secp256k1::{Keypair, Message, Secp256k1, XOnlyPublicKey, schnorr};

use super::SigningError;
use super::address;

static SECP: LazyLock<Secp256k1<secp256k1::All>> = LazyLock::new(Secp256k1::new);

/// Author keypair used to sign records.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
    public: XOnlyPublicKey,
}

impl Keys {
    /// Create from a 32-byte secret key.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        let keypair = Keypair::from_seckey_slice(&SECP, bytes)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let (public, _) = keypair.x_only_public_key();
        Ok(Self { keypair, public })
    }

    /// Parse a secret key given as 64-char hex or `nsec` bech32.
    pub fn parse(input: &str) -> Result<Self, SigningError> {
        let input = input.trim();
        let bytes = if input.starts_with("nsec1") {
            address::decode_nsec(input).map_err(|e| SigningError::InvalidKey(e.to_string()))?
        } else {
            decode_hex32(input).ok_or_else(|| {
                SigningError::InvalidKey("expected 64 hex characters or nsec".into())
            })?
        };
        Self::from_secret_bytes(&bytes)
    }

    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let keypair = Keypair::new(&SECP, &mut secp256k1::rand::thread_rng());
        let (public, _) = keypair.x_only_public_key();
        Self { keypair, public }
    }

    /// X-only public key, lower-case hex.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.serialize()
    }

    /// Secret key, lower-case hex.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.keypair.secret_bytes())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.keypair.secret_bytes()
    }

    /// Sign a 32-byte record id, returning the 64-byte signature as hex.
    pub fn sign(&self, id: &[u8; 32]) -> String {
        let msg = Message::from_digest(*id);
        let sig = SECP.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        hex::encode(sig.serialize())
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keys({})", &self.public_hex()[..16])
    }
}

/// Verify a hex signature over a record id for a hex x-only public key.
pub fn verify(pubkey_hex: &str, id: &[u8; 32], sig_hex: &str) -> bool {
    let Some(public) = decode_hex32(pubkey_hex)
        .and_then(|bytes| XOnlyPublicKey::from_slice(&bytes).ok())
    else {
        return false;
    };
    let Some(sig) = hex::decode(sig_hex)
        .ok()
        .and_then(|bytes| schnorr::Signature::from_slice(&bytes).ok())
    else {
        return false;
    };
    SECP.verify_schnorr(&sig, &Message::from_digest(*id), &public)
        .is_ok()
}

/// Decode exactly 32 bytes of hex.
pub fn decode_hex32(input: &str) -> Option<[u8; 32]> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(input, &mut out).ok()?;
    Some(out)
}
