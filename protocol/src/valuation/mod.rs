//! # Valuation Engine
//!
//! Fixed-point pricing and risk checks over decoded datums. Everything
//! here is a pure function of its inputs: no I/O, no clocks, no floats.
//!
//! ## Architecture
//!
//! ```text
//! weights.rs  : basket weight sums and validation
//! price.rs    : basket price from oracle quotes
//! ratio.rs    : collateral ratio and health threshold
//! amount.rs   : display amount parsing (6 decimals)
//! position.rs : vault valuation and successor datums
//! ```
//!
//! ## Units
//!
//! | Quantity     | Unit                         |
//! |--------------|------------------------------|
//! | prices       | micro-USD (`1_000_000` = $1) |
//! | weights      | basis points, sum `10_000`   |
//! | ratios       | basis points (`15_000` = 150%) |
//! | collateral   | lovelace                     |
//! | basket debt  | token units (6 decimals)     |
//!
//! Intermediate products are computed in `u128` so that no legal input
//! can overflow before the final division.

pub mod amount;
pub mod position;
pub mod price;
pub mod ratio;
pub mod weights;

use thiserror::Error;

pub use amount::{format_token_amount, parse_token_amount};
pub use position::VaultPosition;
pub use price::{basket_price, PriceTable};
pub use ratio::{collateral_ratio, is_healthy, CollateralRatio};
pub use weights::{sum_weights, validate_weights};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by valuation and vault-transition checks.
///
/// None of these are retryable: the same inputs always fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    /// A basket constituent has no oracle quote.
    #[error("no oracle price for asset {asset}")]
    UnknownAsset {
        /// The missing symbol.
        asset: String,
    },

    /// Basket weights do not sum to exactly 10 000 basis points.
    #[error("basket weights sum to {total} bps, expected 10000")]
    InvalidWeights {
        /// The actual sum, saturated at `u64::MAX`.
        total: u64,
    },

    /// The amount rounds to less than one on-chain unit.
    #[error("amount is below the smallest unit (0.000001)")]
    AmountTooSmall,

    /// The amount does not fit in a signed 64-bit ledger integer.
    #[error("amount {amount} is out of range")]
    AmountOutOfRange {
        /// Offending amount, as supplied.
        amount: String,
    },

    /// The display amount is not a decimal number.
    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount {
        /// Input as supplied.
        input: String,
        /// Parser message.
        reason: String,
    },

    /// The resulting position would fall below the collateral threshold.
    #[error(
        "insufficient collateral: {collateral_usd} micro-USD backing {debt_usd} micro-USD \
         of debt, minimum ratio {threshold_bps} bps"
    )]
    InsufficientCollateral {
        /// Collateral value after the action, micro-USD.
        collateral_usd: u64,
        /// Debt value after the action, micro-USD.
        debt_usd: u64,
        /// Threshold the position was checked against.
        threshold_bps: u64,
    },

    /// Attempted to burn more basket tokens than the vault has minted.
    #[error("cannot burn {requested} units, only {minted} minted")]
    BurnExceedsMinted {
        /// Units the caller tried to burn.
        requested: u64,
        /// Units outstanding in the vault.
        minted: u64,
    },

    /// Attempted to withdraw more lovelace than the vault holds.
    #[error("cannot withdraw {requested} lovelace, vault holds {available}")]
    WithdrawExceedsCollateral {
        /// Lovelace the caller tried to withdraw.
        requested: u64,
        /// Lovelace locked in the vault.
        available: u64,
    },

    /// A withdrawal would leave the vault output below the minimum it
    /// must keep to exist on the ledger.
    #[error("withdrawal leaves {remaining} lovelace, vault must keep {minimum}")]
    CollateralBelowMinimum {
        /// Lovelace left after the withdrawal.
        remaining: u64,
        /// Minimum collateral of a live vault.
        minimum: u64,
    },
}
