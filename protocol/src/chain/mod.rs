//! # Chain Boundary
//!
//! The client never talks to a node directly. It sees the ledger through
//! two capabilities: [`UtxoQuery`] to list outputs at a script address,
//! and [`TxSubmitter`] to hand over a [`TxRequest`] for balancing, signing
//! and broadcast. Whatever wallet or indexer backs them is out of scope.
//!
//! ```text
//! tx.rs     : TxRequest and its builder
//! select.rs : picking the oracle / basket / vault output to act on
//! memory.rs : in-process ledger for tests and dry runs
//! ```

pub mod memory;
pub mod select;
pub mod tx;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{CodecError, OutputReference, PlutusCodec, TxHash};

pub use memory::InMemoryLedger;
pub use select::{select_basket, select_oracle, select_vault, Selected};
pub use tx::{MintEntry, ScriptInput, TxKind, TxOutput, TxRequest, TxRequestBuilder};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures at the chain boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The UTxO provider could not answer.
    #[error("utxo query at {address} failed: {reason}")]
    Query { address: String, reason: String },

    /// The submitter rejected or failed to broadcast the transaction.
    #[error("transaction submission failed: {0}")]
    Submission(String),

    /// No output at the address carried a usable datum of the wanted kind.
    #[error("no {kind} output found at {address}")]
    NotFound {
        kind: &'static str,
        address: String,
    },
}

// ---------------------------------------------------------------------------
// UTxO
// ---------------------------------------------------------------------------

/// Value held by an output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    pub lovelace: u64,
    /// Native tokens keyed by unit (`policy_id_hex ++ asset_name_hex`).
    #[serde(default)]
    pub tokens: BTreeMap<String, u64>,
}

impl Assets {
    pub fn lovelace(lovelace: u64) -> Self {
        Self {
            lovelace,
            tokens: BTreeMap::new(),
        }
    }
}

/// An unspent transaction output as reported by the query provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_id: TxHash,
    pub output_index: u32,
    pub address: String,
    pub assets: Assets,
    /// Inline datum, raw CBOR.
    pub datum: Option<Vec<u8>>,
}

impl Utxo {
    pub fn out_ref(&self) -> OutputReference {
        OutputReference::new(self.tx_id, self.output_index)
    }

    /// Decodes the inline datum as `T`. `None` if there is no datum.
    pub fn decode_datum<T: PlutusCodec>(&self) -> Option<Result<T, CodecError>> {
        self.datum.as_deref().map(T::decode)
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Lists unspent outputs at an address, in ledger order (oldest first).
#[async_trait]
pub trait UtxoQuery: Send + Sync {
    async fn utxos_at(&self, address: &str) -> Result<Vec<Utxo>, ChainError>;
}

/// Completes, signs and broadcasts a transaction request.
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Returns the id of the submitted transaction. Acceptance into the
    /// mempool is not confirmation.
    async fn submit(&self, request: TxRequest) -> Result<TxHash, ChainError>;
}

#[async_trait]
impl<T: UtxoQuery + ?Sized> UtxoQuery for Arc<T> {
    async fn utxos_at(&self, address: &str) -> Result<Vec<Utxo>, ChainError> {
        (**self).utxos_at(address).await
    }
}

#[async_trait]
impl<T: TxSubmitter + ?Sized> TxSubmitter for Arc<T> {
    async fn submit(&self, request: TxRequest) -> Result<TxHash, ChainError> {
        (**self).submit(request).await
    }
}
