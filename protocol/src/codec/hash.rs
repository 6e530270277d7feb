//! Fixed-length ledger hashes.
//!
//! Credential hashes (28 bytes) identify signers and scripts; transaction
//! ids (32 bytes) identify the transaction that produced an output. Both
//! travel as raw byte strings inside datums and as lowercase hex
//! everywhere else (JSON, logs, persistence).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{CREDENTIAL_HASH_LENGTH, TX_ID_LENGTH};

/// A fixed-length hash of `N` bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash<const N: usize>([u8; N]);

/// Verification-key or script hash (Blake2b-224).
pub type CredentialHash = Hash<CREDENTIAL_HASH_LENGTH>;

/// Transaction id (Blake2b-256).
pub type TxHash = Hash<TX_ID_LENGTH>;

impl<const N: usize> Hash<N> {
    /// Wraps raw hash bytes.
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Copies a slice of exactly `N` bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; N]>::try_from(bytes).ok().map(Self)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex string of exactly `2 * N` characters.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl<const N: usize> fmt::Debug for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash<{}>({}...)", N, &self.to_hex()[..12])
    }
}

impl<const N: usize> fmt::Display for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl<const N: usize> std::str::FromStr for Hash<N> {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl<const N: usize> Serialize for Hash<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de, const N: usize> Deserialize<'de> for Hash<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let h = CredentialHash::new([0xab; 28]);
        let parsed: CredentialHash = h.to_hex().parse().unwrap();
        assert_eq!(parsed, h);
        assert_eq!(h.to_hex().len(), 56);
    }

    #[test]
    fn wrong_length_is_rejected() {
        // A 32-byte tx id is not a credential hash.
        let tx = TxHash::new([1; 32]);
        assert_eq!(
            CredentialHash::from_hex(&tx.to_hex()),
            Err(hex::FromHexError::InvalidStringLength)
        );
        assert!(CredentialHash::from_slice(&[0u8; 27]).is_none());
    }

    #[test]
    fn serializes_as_hex_string() {
        let h = TxHash::new([0x0f; 32]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", "0f".repeat(32)));
        let back: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn debug_is_truncated() {
        let h = CredentialHash::new([0; 28]);
        assert_eq!(format!("{:?}", h), "Hash<28>(000000000000...)");
    }
}
