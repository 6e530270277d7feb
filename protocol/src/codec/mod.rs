//! # Datum Codec
//!
//! Bit-exact translation between the domain records and the Plutus data
//! (CBOR) the EquiBasket validators consume. The validators are a fixed,
//! external trust boundary: if a single tag or list framing differs, the
//! script fails and the whole transaction is rejected.
//!
//! ## Architecture
//!
//! ```text
//! plutus.rs   : Plutus data model, CBOR framing, builders and readers
//! hash.rs     : fixed-length credential hashes and transaction ids
//! datum.rs    : OracleDatum, BasketDatum, VaultDatum
//! redeemer.rs : vault, basket, oracle and token-policy redeemers
//! ```
//!
//! ## Wire Rules
//!
//! 1. Records are `Constr 0` with a fixed field order.
//! 2. Strings are raw UTF-8 byte strings.
//! 3. Tuples are two-element lists, never constructors.
//! 4. Integers are never truncated.

pub mod datum;
pub mod hash;
pub mod plutus;
pub mod redeemer;

use plutus::PlutusData;
use thiserror::Error;

pub use datum::{AssetPrice, BasketAsset, BasketDatum, OracleDatum, VaultDatum};
pub use hash::{CredentialHash, Hash, TxHash};
pub use redeemer::{
    BasketRedeemer, MintAction, OracleRedeemer, OutputReference, TokenPolicyRedeemer,
    VaultRedeemer,
};

/// Errors produced while encoding or decoding Plutus data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The bytes decoded, but not into the expected record shape.
    #[error("malformed {record}: {reason}")]
    MalformedDatum {
        /// Record type being decoded.
        record: &'static str,
        /// What did not match.
        reason: String,
    },

    /// The datum was supplied as hex and the hex itself is invalid.
    #[error("invalid datum hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The record holds a value its own decoder would reject, such as an
    /// amount above `i64::MAX` or a repeated oracle symbol.
    #[error("cannot encode {record}: {reason}")]
    Unencodable {
        /// Record type being encoded.
        record: &'static str,
        /// Which field is out of range.
        reason: String,
    },

    /// CBOR serialization failed.
    #[error("CBOR encoding failed: {0}")]
    Encoding(String),
}

/// A record with a fixed Plutus data representation.
pub trait PlutusCodec: Sized {
    /// Record name used in error messages and logs.
    const NAME: &'static str;

    /// Builds the Plutus data tree for this record.
    fn to_plutus_data(&self) -> PlutusData;

    /// Reads a record back from a Plutus data tree.
    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError>;

    /// Encodes to CBOR bytes.
    ///
    /// The tree is read back through [`PlutusCodec::from_plutus_data`]
    /// first, so every byte string returned here decodes to `self`.
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let data = self.to_plutus_data();
        Self::from_plutus_data(&data).map_err(|e| match e {
            CodecError::MalformedDatum { record, reason } => {
                CodecError::Unencodable { record, reason }
            }
            other => other,
        })?;
        let bytes = plutus::to_cbor(&data)?;
        tracing::debug!(record = Self::NAME, len = bytes.len(), "encoded");
        Ok(bytes)
    }

    /// Decodes from CBOR bytes. Exact inverse of [`PlutusCodec::encode`].
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let data = plutus::from_cbor(bytes, Self::NAME)?;
        Self::from_plutus_data(&data).map_err(|e| {
            tracing::debug!(record = Self::NAME, error = %e, "decode failed");
            e
        })
    }

    /// Encodes to lowercase hex CBOR, the form wallets and indexers use.
    fn to_hex(&self) -> Result<String, CodecError> {
        self.encode().map(hex::encode)
    }

    /// Decodes from hex CBOR.
    fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s.trim())?;
        Self::decode(&bytes)
    }
}
