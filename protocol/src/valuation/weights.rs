//! Basket weight validation.

use super::ValuationError;
use crate::codec::BasketAsset;
use crate::config::WEIGHT_PRECISION;

/// Sums basket weights without overflowing, saturating at `u64::MAX`.
pub fn sum_weights(assets: &[BasketAsset]) -> u64 {
    let total: u128 = assets.iter().map(|a| u128::from(a.weight)).sum();
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Checks that weights sum to exactly [`WEIGHT_PRECISION`].
///
/// Weights are unsigned, so any single weight above 10 000 pushes the sum
/// past the target and is rejected by the same check. An empty basket sums
/// to zero and fails.
pub fn validate_weights(assets: &[BasketAsset]) -> Result<(), ValuationError> {
    let total = sum_weights(assets);
    if total != WEIGHT_PRECISION {
        tracing::debug!(total, assets = assets.len(), "basket weights rejected");
        return Err(ValuationError::InvalidWeights { total });
    }
    Ok(())
}
