//! Key material carried by handshakes.
//!
//! The client does not sign handshakes. It announces the well-known "null"
//! public key and signature that the reference peers accept from anonymous
//! nodes. Textual forms are base58 with a RIPEMD160 checksum:
//!
//! ```text
//! EOS<base58(key ‖ ripemd160(key)[..4])>               legacy public key
//! PUB_K1_<base58(key ‖ ripemd160(key ‖ "K1")[..4])>    public key
//! SIG_K1_<base58(sig ‖ ripemd160(sig ‖ "K1")[..4])>    signature
//! EOS<base58(curve ‖ sig ‖ ripemd160(curve ‖ sig)[..4])> legacy null signature
//! ```
//!
//! Parsing decodes the body and checks length and checksum. Signatures are
//! not verified against anything.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use ripemd::{Digest, Ripemd160};
use serde::{Deserialize, Serialize};

use super::errors::KeyError;

/// Null public key announced by anonymous peers.
pub const NULL_PUBLIC_KEY: &str = "EOS1111111111111111111111111111111114T1Anm";

/// Null signature announced by anonymous peers.
pub const NULL_SIGNATURE: &str =
    "EOS111111111111111111111111111111111111111111111111111111111111111111LHpNx";

/// Compressed secp256k1 public key length.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Compact secp256k1 signature length.
pub const SIGNATURE_LEN: usize = 65;

/// Curve tag written in front of K1 key material on the wire.
pub const CURVE_K1: u8 = 0;

const CHECKSUM_LEN: usize = 4;
const K1_SUFFIX: &[u8] = b"K1";

fn checksum(data: &[u8], suffix: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(suffix);
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Base58-decode `body` and strip its checksum. `None` if either fails.
fn decode_checked(body: &str, suffix: &[u8]) -> Option<Vec<u8>> {
    let mut raw = bs58::decode(body).into_vec().ok()?;
    if raw.len() <= CHECKSUM_LEN {
        return None;
    }
    let data_len = raw.len() - CHECKSUM_LEN;
    if raw[data_len..] != checksum(&raw[..data_len], suffix) {
        return None;
    }
    raw.truncate(data_len);
    Some(raw)
}

fn encode_checked(data: &[u8], suffix: &[u8]) -> String {
    let mut raw = Vec::with_capacity(data.len() + CHECKSUM_LEN);
    raw.extend_from_slice(data);
    raw.extend_from_slice(&checksum(data, suffix));
    bs58::encode(raw).into_string()
}

/// Public key: 33 key bytes plus the text it was parsed from.
///
/// Equality and hashing look at the key bytes only, so the `EOS...` and
/// `PUB_K1_...` spellings of one key compare equal.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey {
    data: [u8; PUBLIC_KEY_LEN],
    text: String,
}

impl PublicKey {
    /// The null key.
    pub fn null() -> Result<Self, KeyError> {
        NULL_PUBLIC_KEY.parse()
    }

    /// Key from its compressed bytes, rendered in the legacy `EOS` form.
    pub fn from_bytes(data: [u8; PUBLIC_KEY_LEN]) -> Self {
        let text = format!("EOS{}", encode_checked(&data, &[]));
        Self { data, text }
    }

    /// Compressed key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.data
    }

    /// Textual form.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data = if let Some(body) = s.strip_prefix("PUB_K1_") {
            decode_checked(body, K1_SUFFIX)
        } else if let Some(body) = s.strip_prefix("EOS") {
            decode_checked(body, &[])
        } else {
            None
        };

        let data = data
            .and_then(|d| <[u8; PUBLIC_KEY_LEN]>::try_from(d.as_slice()).ok())
            .ok_or_else(|| KeyError::InvalidPublicKey(s.to_string()))?;

        Ok(Self {
            data,
            text: s.to_string(),
        })
    }
}

impl TryFrom<String> for PublicKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.text
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.text).finish()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// K1 signature: 65 bytes plus the text it was parsed from.
///
/// Compares by bytes, like [`PublicKey`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature {
    data: [u8; SIGNATURE_LEN],
    text: String,
}

impl Signature {
    /// The null signature.
    pub fn null() -> Result<Self, KeyError> {
        NULL_SIGNATURE.parse()
    }

    /// Signature from its bytes, rendered in the `SIG_K1_` form.
    pub fn from_bytes(data: [u8; SIGNATURE_LEN]) -> Self {
        let text = format!("SIG_K1_{}", encode_checked(&data, K1_SUFFIX));
        Self { data, text }
    }

    /// Signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.data
    }

    /// Textual form.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data = if let Some(body) = s.strip_prefix("SIG_K1_") {
            decode_checked(body, K1_SUFFIX)
        } else if let Some(body) = s.strip_prefix("EOS") {
            // legacy form carries the curve tag inside the checksummed data
            decode_checked(body, &[]).and_then(|d| match d.split_first() {
                Some((&CURVE_K1, rest)) => Some(rest.to_vec()),
                _ => None,
            })
        } else {
            None
        };

        let data = data
            .and_then(|d| <[u8; SIGNATURE_LEN]>::try_from(d.as_slice()).ok())
            .ok_or_else(|| KeyError::InvalidSignature(s.to_string()))?;

        Ok(Self {
            data,
            text: s.to_string(),
        })
    }
}

impl TryFrom<String> for Signature {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.text
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature").field(&self.text).finish()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
