//! On-chain datums: oracle prices, basket definitions, vault positions.
//!
//! Field order is fixed by the validator blueprints and must never change:
//!
//! ```text
//! OracleDatum = Constr 0 [ prices: [[symbol, price]], last_updated, admin ]
//! BasketDatum = Constr 0 [ basket_id, name, assets: [[id, weight]], creator, created_at ]
//! VaultDatum  = Constr 0 [ owner, basket_id, collateral_ada, minted_tokens, created_at ]
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::hash::CredentialHash;
use super::plutus::{self, malformed, PlutusData};
use super::{CodecError, PlutusCodec};
use crate::config::{MAX_AMOUNT, WEIGHT_PRECISION};
use crate::valuation::{self, ValuationError};

fn credential(
    data: &PlutusData,
    record: &'static str,
    field: &str,
) -> Result<CredentialHash, CodecError> {
    let raw = plutus::expect_bytes(data, record, field)?;
    CredentialHash::from_slice(raw).ok_or_else(|| {
        malformed(
            record,
            format!("{field}: expected 28-byte credential hash, found {} bytes", raw.len()),
        )
    })
}

// ---------------------------------------------------------------------------
// OracleDatum
// ---------------------------------------------------------------------------

/// One oracle quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrice {
    /// Asset symbol, e.g. `"BTC"`.
    pub symbol: String,
    /// Price in micro-USD.
    pub price_micro_usd: u64,
}

impl AssetPrice {
    pub fn new(symbol: impl Into<String>, price_micro_usd: u64) -> Self {
        Self {
            symbol: symbol.into(),
            price_micro_usd,
        }
    }

    fn to_plutus(&self) -> PlutusData {
        plutus::pair(
            plutus::text(&self.symbol),
            plutus::uint(self.price_micro_usd),
        )
    }

    fn from_plutus(data: &PlutusData, record: &'static str) -> Result<Self, CodecError> {
        let (symbol, price) = plutus::expect_pair(data, record, "prices[]")?;
        Ok(Self {
            symbol: plutus::expect_text(symbol, record, "prices[].symbol")?,
            price_micro_usd: plutus::expect_uint(price, record, "prices[].price", MAX_AMOUNT)?,
        })
    }
}

pub(crate) fn encode_prices(prices: &[AssetPrice]) -> PlutusData {
    plutus::list(prices.iter().map(AssetPrice::to_plutus).collect())
}

/// Decodes a price list, rejecting repeated symbols.
pub(crate) fn decode_prices(
    data: &PlutusData,
    record: &'static str,
) -> Result<Vec<AssetPrice>, CodecError> {
    let items = plutus::expect_list(data, record, "prices")?;
    let mut seen = HashSet::with_capacity(items.len());
    let mut prices = Vec::with_capacity(items.len());
    for item in items {
        let price = AssetPrice::from_plutus(item, record)?;
        if !seen.insert(price.symbol.clone()) {
            return Err(malformed(
                record,
                format!("duplicate price for {}", price.symbol),
            ));
        }
        prices.push(price);
    }
    Ok(prices)
}

/// Price snapshot published by the oracle admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleDatum {
    /// Quotes in publication order. Symbols are unique.
    pub prices: Vec<AssetPrice>,
    /// Unix-ms timestamp of publication.
    pub last_updated: u64,
    /// Key hash allowed to supersede this datum.
    pub admin: CredentialHash,
}

impl OracleDatum {
    /// Looks up the price of `symbol`.
    pub fn price_of(&self, symbol: &str) -> Option<u64> {
        self.prices
            .iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.price_micro_usd)
    }
}

impl PlutusCodec for OracleDatum {
    const NAME: &'static str = "OracleDatum";

    fn to_plutus_data(&self) -> PlutusData {
        plutus::constr(
            0,
            vec![
                encode_prices(&self.prices),
                plutus::uint(self.last_updated),
                plutus::bytes(self.admin.as_bytes()),
            ],
        )
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        let fields = plutus::expect_constr(data, Self::NAME, 0, 3)?;
        Ok(Self {
            prices: decode_prices(&fields[0], Self::NAME)?,
            last_updated: plutus::expect_uint(&fields[1], Self::NAME, "last_updated", MAX_AMOUNT)?,
            admin: credential(&fields[2], Self::NAME, "admin")?,
        })
    }
}

// ---------------------------------------------------------------------------
// BasketDatum
// ---------------------------------------------------------------------------

/// One basket constituent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketAsset {
    /// Oracle symbol of the constituent.
    pub id: String,
    /// Weight in basis points, `0..=10_000`.
    pub weight: u64,
}

impl BasketAsset {
    pub fn new(id: impl Into<String>, weight: u64) -> Self {
        Self {
            id: id.into(),
            weight,
        }
    }
}

pub(crate) fn encode_assets(assets: &[BasketAsset]) -> PlutusData {
    plutus::list(
        assets
            .iter()
            .map(|a| plutus::pair(plutus::text(&a.id), plutus::uint(a.weight)))
            .collect(),
    )
}

pub(crate) fn decode_assets(
    data: &PlutusData,
    record: &'static str,
) -> Result<Vec<BasketAsset>, CodecError> {
    plutus::expect_list(data, record, "assets")?
        .iter()
        .map(|item| {
            let (id, weight) = plutus::expect_pair(item, record, "assets[]")?;
            Ok(BasketAsset {
                id: plutus::expect_text(id, record, "assets[].id")?,
                weight: plutus::expect_uint(weight, record, "assets[].weight", WEIGHT_PRECISION)?,
            })
        })
        .collect()
}

/// Immutable basket definition created through the basket factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketDatum {
    pub basket_id: String,
    pub name: String,
    pub assets: Vec<BasketAsset>,
    pub creator: CredentialHash,
    pub created_at: u64,
}

impl BasketDatum {
    /// Builds a basket after checking that its weights sum to exactly
    /// 10 000 basis points. The codec itself never checks this.
    pub fn new(
        basket_id: impl Into<String>,
        name: impl Into<String>,
        assets: Vec<BasketAsset>,
        creator: CredentialHash,
        created_at: u64,
    ) -> Result<Self, ValuationError> {
        valuation::validate_weights(&assets)?;
        Ok(Self {
            basket_id: basket_id.into(),
            name: name.into(),
            assets,
            creator,
            created_at,
        })
    }
}

impl PlutusCodec for BasketDatum {
    const NAME: &'static str = "BasketDatum";

    fn to_plutus_data(&self) -> PlutusData {
        plutus::constr(
            0,
            vec![
                plutus::text(&self.basket_id),
                plutus::text(&self.name),
                encode_assets(&self.assets),
                plutus::bytes(self.creator.as_bytes()),
                plutus::uint(self.created_at),
            ],
        )
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        let fields = plutus::expect_constr(data, Self::NAME, 0, 5)?;
        Ok(Self {
            basket_id: plutus::expect_text(&fields[0], Self::NAME, "basket_id")?,
            name: plutus::expect_text(&fields[1], Self::NAME, "name")?,
            assets: decode_assets(&fields[2], Self::NAME)?,
            creator: credential(&fields[3], Self::NAME, "creator")?,
            created_at: plutus::expect_uint(&fields[4], Self::NAME, "created_at", MAX_AMOUNT)?,
        })
    }
}

// ---------------------------------------------------------------------------
// VaultDatum
// ---------------------------------------------------------------------------

/// A collateralized debt position against one basket.
///
/// Every deposit, withdrawal, mint and burn produces a successor with the
/// same `owner`, `basket_id` and `created_at`; see
/// [`crate::valuation::VaultPosition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDatum {
    pub owner: CredentialHash,
    pub basket_id: String,
    /// ADA locked in the vault, in lovelace.
    pub collateral_lovelace: u64,
    /// Outstanding basket tokens, in on-chain units (6 decimals).
    pub minted_token_units: u64,
    pub created_at: u64,
}

impl VaultDatum {
    /// A freshly opened vault: collateral locked, nothing minted yet.
    pub fn open(
        owner: CredentialHash,
        basket_id: impl Into<String>,
        collateral_lovelace: u64,
        created_at: u64,
    ) -> Self {
        Self {
            owner,
            basket_id: basket_id.into(),
            collateral_lovelace,
            minted_token_units: 0,
            created_at,
        }
    }
}

impl PlutusCodec for VaultDatum {
    const NAME: &'static str = "VaultDatum";

    fn to_plutus_data(&self) -> PlutusData {
        plutus::constr(
            0,
            vec![
                plutus::bytes(self.owner.as_bytes()),
                plutus::text(&self.basket_id),
                plutus::uint(self.collateral_lovelace),
                plutus::uint(self.minted_token_units),
                plutus::uint(self.created_at),
            ],
        )
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        let fields = plutus::expect_constr(data, Self::NAME, 0, 5)?;
        Ok(Self {
            owner: credential(&fields[0], Self::NAME, "owner")?,
            basket_id: plutus::expect_text(&fields[1], Self::NAME, "basket_id")?,
            collateral_lovelace: plutus::expect_uint(
                &fields[2],
                Self::NAME,
                "collateral_ada",
                MAX_AMOUNT,
            )?,
            minted_token_units: plutus::expect_uint(
                &fields[3],
                Self::NAME,
                "minted_tokens",
                MAX_AMOUNT,
            )?,
            created_at: plutus::expect_uint(&fields[4], Self::NAME, "created_at", MAX_AMOUNT)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
