//! Error type for client actions.
//!
//! Wraps the error of every layer an action passes through, so callers
//! can match on the layer that failed. Nothing here is retried.

use thiserror::Error;

use crate::chain::ChainError;
use crate::codec::CodecError;
use crate::storage::DbError;
use crate::valuation::ValuationError;

/// Errors returned by [`super::EquiBasketClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Valuation(#[from] ValuationError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Db(#[from] DbError),

    /// The network configuration cannot be used (bad policy id, etc.).
    #[error("invalid network configuration: {0}")]
    InvalidConfig(String),

    /// The same oracle symbol was supplied twice.
    #[error("duplicate oracle price for {0}")]
    DuplicateAsset(String),

    /// The vault deposit is below the minimum accepted by the UI.
    #[error("deposit of {lovelace} lovelace is below the minimum of {minimum}")]
    DepositBelowMinimum {
        /// Lovelace offered.
        lovelace: u64,
        /// Minimum accepted.
        minimum: u64,
    },

    /// A basket with this id is already defined on chain.
    #[error("basket {0} is already defined on chain")]
    BasketExists(String),

    /// The signer already has a vault for this basket.
    #[error("a vault for basket {0} already exists")]
    VaultExists(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
