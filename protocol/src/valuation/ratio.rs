//! Collateral ratio and health threshold.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BPS_DENOMINATOR;

/// Collateral value over debt value, in basis points.
///
/// `15_000` is 150.00%. A vault with no debt has an infinite ratio and is
/// always healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CollateralRatio {
    Finite(u64),
    Infinite,
}

impl CollateralRatio {
    /// Ratio in basis points, or `None` when infinite.
    pub fn bps(&self) -> Option<u64> {
        match self {
            Self::Finite(bps) => Some(*bps),
            Self::Infinite => None,
        }
    }

    /// Returns `true` if the ratio meets `threshold_bps`.
    pub fn meets(&self, threshold_bps: u64) -> bool {
        match self {
            Self::Finite(bps) => *bps >= threshold_bps,
            Self::Infinite => true,
        }
    }
}

impl fmt::Display for CollateralRatio {
    /// `150.00%`, or `∞` with no debt.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(bps) => write!(f, "{}.{:02}%", bps / 100, bps % 100),
            Self::Infinite => f.write_str("∞"),
        }
    }
}

/// Computes `collateral * 10_000 / minted`, truncated.
///
/// Both inputs are in the same unit (micro-USD). The result saturates at
/// `u64::MAX` for absurdly over-collateralized positions.
pub fn collateral_ratio(collateral_usd: u64, minted_usd: u64) -> CollateralRatio {
    if minted_usd == 0 {
        return CollateralRatio::Infinite;
    }
    let bps = u128::from(collateral_usd) * u128::from(BPS_DENOMINATOR) / u128::from(minted_usd);
    CollateralRatio::Finite(u64::try_from(bps).unwrap_or(u64::MAX))
}

/// Returns `true` if `collateral * 10_000 >= minted * threshold_bps`.
///
/// Evaluated by cross-multiplication, so it is exact even where
/// [`collateral_ratio`] truncates.
pub fn is_healthy(collateral_usd: u64, minted_usd: u64, threshold_bps: u64) -> bool {
    u128::from(collateral_usd) * u128::from(BPS_DENOMINATOR)
        >= u128::from(minted_usd) * u128::from(threshold_bps)
}
