//! Basket pricing.
//!
//! A basket's price is the weighted sum of its constituents' oracle
//! prices. Each term is floored on its own before summing, matching the
//! on-chain arithmetic, so the result does not depend on asset order.

use std::collections::{BTreeMap, HashMap};

use super::ValuationError;
use crate::codec::{AssetPrice, BasketAsset, OracleDatum};
use crate::config::WEIGHT_PRECISION;

/// Anything that can quote a micro-USD price by symbol.
pub trait PriceTable {
    fn price_of(&self, symbol: &str) -> Option<u64>;
}

impl PriceTable for OracleDatum {
    fn price_of(&self, symbol: &str) -> Option<u64> {
        OracleDatum::price_of(self, symbol)
    }
}

impl PriceTable for [AssetPrice] {
    fn price_of(&self, symbol: &str) -> Option<u64> {
        self.iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.price_micro_usd)
    }
}

impl PriceTable for BTreeMap<String, u64> {
    fn price_of(&self, symbol: &str) -> Option<u64> {
        self.get(symbol).copied()
    }
}

impl PriceTable for HashMap<String, u64> {
    fn price_of(&self, symbol: &str) -> Option<u64> {
        self.get(symbol).copied()
    }
}

/// Computes the basket price in micro-USD.
///
/// `Σ price(asset) * weight / 10_000`, with integer division per term.
///
/// # Errors
///
/// - [`ValuationError::UnknownAsset`] if any constituent has no quote.
/// - [`ValuationError::AmountOutOfRange`] if the price exceeds `u64`.
pub fn basket_price<P>(assets: &[BasketAsset], prices: &P) -> Result<u64, ValuationError>
where
    P: PriceTable + ?Sized,
{
    let mut total: u128 = 0;
    for asset in assets {
        let price = prices
            .price_of(&asset.id)
            .ok_or_else(|| ValuationError::UnknownAsset {
                asset: asset.id.clone(),
            })?;
        total += u128::from(price) * u128::from(asset.weight) / u128::from(WEIGHT_PRECISION);
    }

    u64::try_from(total).map_err(|_| ValuationError::AmountOutOfRange {
        amount: total.to_string(),
    })
}
