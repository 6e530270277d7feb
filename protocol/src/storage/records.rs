//! Rows kept by the off-chain store.
//!
//! These mirror on-chain state for fast listing and display. The chain is
//! always authoritative: a row is written after its transaction has been
//! submitted and stays [`RecordStatus::Pending`] until confirmation is
//! observed.

use serde::{Deserialize, Serialize};

use crate::codec::{BasketAsset, BasketDatum, CredentialHash, TxHash, VaultDatum};

/// Whether the transaction behind a row is known to be on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Pending,
    Confirmed,
}

/// A basket definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketRecord {
    pub basket_id: String,
    pub name: String,
    pub description: Option<String>,
    pub assets: Vec<BasketAsset>,
    pub creator: CredentialHash,
    pub tx_hash: Option<TxHash>,
    pub status: RecordStatus,
    /// Unix ms.
    pub created_at: u64,
}

impl BasketRecord {
    /// Row for a basket datum just submitted in `tx_hash`.
    pub fn pending(datum: &BasketDatum, tx_hash: TxHash) -> Self {
        Self {
            basket_id: datum.basket_id.clone(),
            name: datum.name.clone(),
            description: None,
            assets: datum.assets.clone(),
            creator: datum.creator,
            tx_hash: Some(tx_hash),
            status: RecordStatus::Pending,
            created_at: datum.created_at,
        }
    }
}

/// Last known price of one oracle asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePriceRecord {
    pub asset_id: String,
    pub asset_name: String,
    pub price_micro_usd: u64,
    /// Unix ms.
    pub updated_at: u64,
}

/// A user's vault for one basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub owner: CredentialHash,
    pub basket_id: String,
    pub collateral_lovelace: u64,
    pub minted_token_units: u64,
    pub tx_hash: Option<TxHash>,
    pub status: RecordStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl VaultRecord {
    /// Row for a vault datum just submitted in `tx_hash` at `now` (Unix ms).
    pub fn pending(datum: &VaultDatum, tx_hash: TxHash, now: u64) -> Self {
        Self {
            owner: datum.owner,
            basket_id: datum.basket_id.clone(),
            collateral_lovelace: datum.collateral_lovelace,
            minted_token_units: datum.minted_token_units,
            tx_hash: Some(tx_hash),
            status: RecordStatus::Pending,
            created_at: datum.created_at,
            updated_at: now,
        }
    }
}
