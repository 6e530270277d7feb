//! Vault valuation and successor datums.
//!
//! A [`VaultPosition`] pairs a decoded [`VaultDatum`] with the two prices
//! needed to value it: ADA (collateral) and the basket (debt). Every vault
//! action is expressed here as a pure transition from the current datum to
//! its successor, checked against the collateral threshold before any
//! transaction is built.

use serde::{Deserialize, Serialize};

use super::price::{basket_price, PriceTable};
use super::ratio::{self, CollateralRatio};
use super::ValuationError;
use crate::codec::{BasketDatum, VaultDatum};
use crate::config::{
    ValuationConfig, BPS_DENOMINATOR, MAX_AMOUNT, MIN_VAULT_DEPOSIT_LOVELACE, ORACLE_ASSET_ADA,
    PRICE_PRECISION,
};

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// USD value of `quantity` base units at `price` micro-USD per whole unit
/// (both lovelace and token units have six decimals).
fn value_usd(quantity: u64, price: u64) -> u64 {
    saturate(u128::from(quantity) * u128::from(price) / u128::from(PRICE_PRECISION))
}

/// A vault valued at a specific oracle snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPosition {
    /// Current on-chain state.
    pub vault: VaultDatum,
    /// ADA price, micro-USD.
    pub ada_price: u64,
    /// Basket price, micro-USD per whole token.
    pub basket_price: u64,
}

impl VaultPosition {
    pub fn new(vault: VaultDatum, ada_price: u64, basket_price: u64) -> Self {
        Self {
            vault,
            ada_price,
            basket_price,
        }
    }

    /// Values `vault` against an oracle snapshot and the basket it mints.
    ///
    /// # Errors
    ///
    /// [`ValuationError::UnknownAsset`] if the oracle lacks an ADA quote or
    /// a quote for any basket constituent.
    pub fn from_oracle<P>(
        vault: VaultDatum,
        basket: &BasketDatum,
        prices: &P,
    ) -> Result<Self, ValuationError>
    where
        P: PriceTable + ?Sized,
    {
        let ada_price = prices
            .price_of(ORACLE_ASSET_ADA)
            .ok_or_else(|| ValuationError::UnknownAsset {
                asset: ORACLE_ASSET_ADA.to_string(),
            })?;
        let basket_price = basket_price(&basket.assets, prices)?;
        Ok(Self::new(vault, ada_price, basket_price))
    }

    /// Collateral value in micro-USD.
    pub fn collateral_value_usd(&self) -> u64 {
        value_usd(self.vault.collateral_lovelace, self.ada_price)
    }

    /// Debt value in micro-USD.
    pub fn debt_value_usd(&self) -> u64 {
        value_usd(self.vault.minted_token_units, self.basket_price)
    }

    pub fn ratio(&self) -> CollateralRatio {
        ratio::collateral_ratio(self.collateral_value_usd(), self.debt_value_usd())
    }

    pub fn is_healthy(&self, cfg: &ValuationConfig) -> bool {
        ratio::is_healthy(
            self.collateral_value_usd(),
            self.debt_value_usd(),
            cfg.min_collateral_ratio_bps,
        )
    }

    /// Largest number of additional units that can be minted while the
    /// position stays healthy.
    pub fn max_mintable_units(&self, cfg: &ValuationConfig) -> u64 {
        let headroom = MAX_AMOUNT.saturating_sub(self.vault.minted_token_units);
        if self.basket_price == 0 {
            return headroom;
        }
        if cfg.min_collateral_ratio_bps == 0 {
            return headroom;
        }

        // Largest debt value D with D * threshold <= collateral * 10_000.
        let max_debt = u128::from(self.collateral_value_usd()) * u128::from(BPS_DENOMINATOR)
            / u128::from(cfg.min_collateral_ratio_bps);
        // Debt value is floor(units * price / 10^6), so units may go up to
        // the last value that still floors to max_debt.
        let max_units = ((max_debt + 1) * u128::from(PRICE_PRECISION) - 1)
            / u128::from(self.basket_price);

        saturate(max_units)
            .saturating_sub(self.vault.minted_token_units)
            .min(headroom)
    }

    /// Smallest collateral, in lovelace, that keeps `minted_units` of debt
    /// healthy at current prices. `None` if ADA is priced at zero while
    /// the debt has value.
    pub fn required_collateral_lovelace(
        &self,
        minted_units: u64,
        cfg: &ValuationConfig,
    ) -> Option<u64> {
        let debt = u128::from(value_usd(minted_units, self.basket_price));
        let threshold = u128::from(cfg.min_collateral_ratio_bps);
        let bps = u128::from(BPS_DENOMINATOR);
        let required_usd = (debt * threshold + bps - 1) / bps;
        if required_usd == 0 {
            return Some(0);
        }
        if self.ada_price == 0 {
            return None;
        }
        let price = u128::from(self.ada_price);
        let lovelace = (required_usd * u128::from(PRICE_PRECISION) + price - 1) / price;
        u64::try_from(lovelace).ok()
    }

    fn with_amounts(&self, collateral_lovelace: u64, minted_token_units: u64) -> Self {
        Self {
            vault: VaultDatum {
                collateral_lovelace,
                minted_token_units,
                ..self.vault.clone()
            },
            ada_price: self.ada_price,
            basket_price: self.basket_price,
        }
    }

    fn ensure_healthy(&self, cfg: &ValuationConfig) -> Result<(), ValuationError> {
        if self.is_healthy(cfg) {
            return Ok(());
        }
        Err(ValuationError::InsufficientCollateral {
            collateral_usd: self.collateral_value_usd(),
            debt_usd: self.debt_value_usd(),
            threshold_bps: cfg.min_collateral_ratio_bps,
        })
    }

    /// Successor after locking `lovelace` more collateral.
    pub fn deposit(&self, lovelace: u64) -> Result<VaultDatum, ValuationError> {
        if lovelace == 0 {
            return Err(ValuationError::AmountTooSmall);
        }
        let collateral = self
            .vault
            .collateral_lovelace
            .checked_add(lovelace)
            .filter(|c| *c <= MAX_AMOUNT)
            .ok_or_else(|| ValuationError::AmountOutOfRange {
                amount: lovelace.to_string(),
            })?;
        Ok(self
            .with_amounts(collateral, self.vault.minted_token_units)
            .vault)
    }

    /// Successor after releasing `lovelace` of collateral. The remaining
    /// position must stay healthy and keep at least
    /// [`MIN_VAULT_DEPOSIT_LOVELACE`], since the vault output is recreated.
    pub fn withdraw(
        &self,
        lovelace: u64,
        cfg: &ValuationConfig,
    ) -> Result<VaultDatum, ValuationError> {
        if lovelace == 0 {
            return Err(ValuationError::AmountTooSmall);
        }
        let available = self.vault.collateral_lovelace;
        let collateral =
            available
                .checked_sub(lovelace)
                .ok_or(ValuationError::WithdrawExceedsCollateral {
                    requested: lovelace,
                    available,
                })?;
        if collateral < MIN_VAULT_DEPOSIT_LOVELACE {
            return Err(ValuationError::CollateralBelowMinimum {
                remaining: collateral,
                minimum: MIN_VAULT_DEPOSIT_LOVELACE,
            });
        }
        let next = self.with_amounts(collateral, self.vault.minted_token_units);
        next.ensure_healthy(cfg)?;
        Ok(next.vault)
    }

    /// Successor after minting `units` more basket tokens.
    pub fn mint(&self, units: u64, cfg: &ValuationConfig) -> Result<VaultDatum, ValuationError> {
        if units == 0 {
            return Err(ValuationError::AmountTooSmall);
        }
        let minted = self
            .vault
            .minted_token_units
            .checked_add(units)
            .filter(|m| *m <= MAX_AMOUNT)
            .ok_or_else(|| ValuationError::AmountOutOfRange {
                amount: units.to_string(),
            })?;
        let next = self.with_amounts(self.vault.collateral_lovelace, minted);
        next.ensure_healthy(cfg)?;
        Ok(next.vault)
    }

    /// Successor after burning `units` basket tokens. Burning only ever
    /// improves the ratio, so no health check is needed.
    pub fn burn(&self, units: u64) -> Result<VaultDatum, ValuationError> {
        if units == 0 {
            return Err(ValuationError::AmountTooSmall);
        }
        let minted = self.vault.minted_token_units;
        let remaining = minted
            .checked_sub(units)
            .ok_or(ValuationError::BurnExceedsMinted {
                requested: units,
                minted,
            })?;
        Ok(self
            .with_amounts(self.vault.collateral_lovelace, remaining)
            .vault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AssetPrice, BasketAsset, CredentialHash, OracleDatum};
    use crate::config::{LOVELACE_PER_ADA, TOKEN_UNIT};

    const ADA_PRICE: u64 = 500_000; // $0.50
    const BASKET_PRICE: u64 = 100 * PRICE_PRECISION; // $100

    fn vault(collateral_ada: u64, minted_tokens: u64) -> VaultDatum {
        VaultDatum {
            owner: CredentialHash::new([7; 28]),
            basket_id: "DEFI".into(),
            collateral_lovelace: collateral_ada * LOVELACE_PER_ADA,
            minted_token_units: minted_tokens * TOKEN_UNIT,
            created_at: 1_700_000_000_000,
        }
    }

    fn position(collateral_ada: u64, minted_tokens: u64) -> VaultPosition {
        VaultPosition::new(vault(collateral_ada, minted_tokens), ADA_PRICE, BASKET_PRICE)
    }

    #[test]
    fn values_collateral_and_debt() {
        let p = position(1_000, 2);
        assert_eq!(p.collateral_value_usd(), 500 * PRICE_PRECISION);
        assert_eq!(p.debt_value_usd(), 200 * PRICE_PRECISION);
        assert_eq!(p.ratio(), CollateralRatio::Finite(25_000));
        assert!(p.is_healthy(&ValuationConfig::default()));
    }

    #[test]
    fn from_oracle_requires_ada_quote() {
        let oracle = OracleDatum {
            prices: vec![AssetPrice::new("BTC", 60_000 * PRICE_PRECISION)],
            last_updated: 0,
            admin: CredentialHash::new([1; 28]),
        };
        let basket = BasketDatum::new(
            "BTC1",
            "Bitcoin only",
            vec![BasketAsset::new("BTC", 10_000)],
            CredentialHash::new([2; 28]),
            0,
        )
        .unwrap();
        let err = VaultPosition::from_oracle(vault(10, 0), &basket, &oracle).unwrap_err();
        assert_eq!(
            err,
            ValuationError::UnknownAsset {
                asset: "ADA".into()
            }
        );
    }

    #[test]
    fn from_oracle_prices_both_legs() {
        let oracle = OracleDatum {
            prices: vec![
                AssetPrice::new("BTC", 60_000 * PRICE_PRECISION),
                AssetPrice::new("ADA", ADA_PRICE),
            ],
            last_updated: 0,
            admin: CredentialHash::new([1; 28]),
        };
        let basket = BasketDatum::new(
            "BTC1",
            "Bitcoin only",
            vec![BasketAsset::new("BTC", 10_000)],
            CredentialHash::new([2; 28]),
            0,
        )
        .unwrap();
        let p = VaultPosition::from_oracle(vault(10, 0), &basket, &oracle).unwrap();
        assert_eq!(p.ada_price, ADA_PRICE);
        assert_eq!(p.basket_price, 60_000 * PRICE_PRECISION);
    }

    #[test]
    fn mint_within_limit_preserves_identity() {
        let p = position(1_000, 0);
        let next = p.mint(3 * TOKEN_UNIT, &ValuationConfig::default()).unwrap();
        assert_eq!(next.minted_token_units, 3 * TOKEN_UNIT);
        assert_eq!(next.owner, p.vault.owner);
        assert_eq!(next.basket_id, p.vault.basket_id);
        assert_eq!(next.created_at, p.vault.created_at);
        assert_eq!(next.collateral_lovelace, p.vault.collateral_lovelace);
    }

    #[test]
    fn mint_beyond_limit_is_rejected() {
        // $500 of collateral supports at most $333.33 of debt at 150%.
        let p = position(1_000, 0);
        let err = p.mint(4 * TOKEN_UNIT, &ValuationConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ValuationError::InsufficientCollateral {
                collateral_usd: 500 * PRICE_PRECISION,
                debt_usd: 400 * PRICE_PRECISION,
                threshold_bps: 15_000,
            }
        );
    }

    #[test]
    fn mint_zero_is_too_small() {
        let p = position(1_000, 0);
        assert_eq!(
            p.mint(0, &ValuationConfig::default()),
            Err(ValuationError::AmountTooSmall)
        );
    }

    #[test]
    fn max_mintable_is_tight() {
        let cfg = ValuationConfig::default();
        let p = position(1_000, 1);
        let max = p.max_mintable_units(&cfg);
        assert!(p.mint(max, &cfg).is_ok());
        assert!(p.mint(max + 1, &cfg).is_err());
        // $333.333333 of debt allowed, $100 already drawn.
        assert_eq!(max, 2_333_333);
    }

    #[test]
    fn max_mintable_is_zero_when_underwater() {
        let p = position(100, 10);
        assert_eq!(p.max_mintable_units(&ValuationConfig::default()), 0);
    }

    #[test]
    fn required_collateral_is_tight() {
        let cfg = ValuationConfig::default();
        let p = position(0, 0);
        let units = 2 * TOKEN_UNIT;
        let required = p.required_collateral_lovelace(units, &cfg).unwrap();
        // $200 of debt needs $300 of ADA at $0.50 = 600 ADA.
        assert_eq!(required, 600 * LOVELACE_PER_ADA);

        let at = VaultPosition::new(
            VaultDatum {
                collateral_lovelace: required,
                minted_token_units: units,
                ..p.vault.clone()
            },
            ADA_PRICE,
            BASKET_PRICE,
        );
        assert!(at.is_healthy(&cfg));
        let below = VaultPosition::new(
            VaultDatum {
                collateral_lovelace: required - 1,
                ..at.vault.clone()
            },
            ADA_PRICE,
            BASKET_PRICE,
        );
        assert!(!below.is_healthy(&cfg));
    }

    #[test]
    fn required_collateral_without_ada_price() {
        let p = VaultPosition::new(vault(0, 0), 0, BASKET_PRICE);
        let cfg = ValuationConfig::default();
        assert_eq!(p.required_collateral_lovelace(0, &cfg), Some(0));
        assert_eq!(p.required_collateral_lovelace(TOKEN_UNIT, &cfg), None);
    }

    #[test]
    fn deposit_adds_collateral() {
        let p = position(10, 0);
        let next = p.deposit(5 * LOVELACE_PER_ADA).unwrap();
        assert_eq!(next.collateral_lovelace, 15 * LOVELACE_PER_ADA);
        assert_eq!(p.deposit(0), Err(ValuationError::AmountTooSmall));
    }

    #[test]
    fn deposit_cannot_overflow() {
        let p = VaultPosition::new(
            VaultDatum {
                collateral_lovelace: MAX_AMOUNT,
                ..vault(0, 0)
            },
            ADA_PRICE,
            BASKET_PRICE,
        );
        assert!(matches!(
            p.deposit(1),
            Err(ValuationError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn withdraw_respects_balance_and_health() {
        let cfg = ValuationConfig::default();
        let p = position(1_000, 2);

        assert_eq!(
            p.withdraw(1_001 * LOVELACE_PER_ADA, &cfg),
            Err(ValuationError::WithdrawExceedsCollateral {
                requested: 1_001 * LOVELACE_PER_ADA,
                available: 1_000 * LOVELACE_PER_ADA,
            })
        );

        // $200 debt needs $300 = 600 ADA; 400 ADA can go.
        let next = p.withdraw(400 * LOVELACE_PER_ADA, &cfg).unwrap();
        assert_eq!(next.collateral_lovelace, 600 * LOVELACE_PER_ADA);
        assert!(matches!(
            p.withdraw(401 * LOVELACE_PER_ADA, &cfg),
            Err(ValuationError::InsufficientCollateral { .. })
        ));
    }

    #[test]
    fn withdraw_keeps_minimum_collateral() {
        let cfg = ValuationConfig::default();
        let p = position(50, 0);
        assert_eq!(
            p.withdraw(50 * LOVELACE_PER_ADA, &cfg),
            Err(ValuationError::CollateralBelowMinimum {
                remaining: 0,
                minimum: MIN_VAULT_DEPOSIT_LOVELACE,
            })
        );
        assert!(matches!(
            p.withdraw(48 * LOVELACE_PER_ADA + 1, &cfg),
            Err(ValuationError::CollateralBelowMinimum { .. })
        ));
        let next = p.withdraw(48 * LOVELACE_PER_ADA, &cfg).unwrap();
        assert_eq!(next.collateral_lovelace, MIN_VAULT_DEPOSIT_LOVELACE);
    }

    #[test]
    fn burn_cannot_exceed_minted() {
        let p = position(1_000, 2);
        assert_eq!(
            p.burn(3 * TOKEN_UNIT),
            Err(ValuationError::BurnExceedsMinted {
                requested: 3 * TOKEN_UNIT,
                minted: 2 * TOKEN_UNIT,
            })
        );
        let next = p.burn(2 * TOKEN_UNIT).unwrap();
        assert_eq!(next.minted_token_units, 0);
    }

    #[test]
    fn custom_threshold_is_honored() {
        let strict = ValuationConfig {
            min_collateral_ratio_bps: 30_000,
        };
        let p = position(1_000, 2); // 250%
        assert!(p.is_healthy(&ValuationConfig::default()));
        assert!(!p.is_healthy(&strict));
    }
}
