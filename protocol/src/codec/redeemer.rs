//! Redeemers: the action selector supplied when a script output is spent
//! or a token is minted. The constructor index is the action's ordinal in
//! the validator's type definition.

use serde::{Deserialize, Serialize};

use super::datum::{decode_assets, decode_prices, encode_assets, encode_prices, AssetPrice, BasketAsset};
use super::hash::TxHash;
use super::plutus::{self, malformed, PlutusData};
use super::{CodecError, PlutusCodec};
use crate::config::MAX_AMOUNT;

// ---------------------------------------------------------------------------
// OutputReference
// ---------------------------------------------------------------------------

/// Pointer to a specific transaction output: `Constr 0 [tx_id, index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputReference {
    pub tx_id: TxHash,
    pub output_index: u32,
}

impl OutputReference {
    pub fn new(tx_id: TxHash, output_index: u32) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }
}

impl std::fmt::Display for OutputReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.output_index)
    }
}

impl PlutusCodec for OutputReference {
    const NAME: &'static str = "OutputReference";

    fn to_plutus_data(&self) -> PlutusData {
        plutus::constr(
            0,
            vec![
                plutus::bytes(self.tx_id.as_bytes()),
                plutus::uint(u64::from(self.output_index)),
            ],
        )
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        let fields = plutus::expect_constr(data, Self::NAME, 0, 2)?;
        let raw = plutus::expect_bytes(&fields[0], Self::NAME, "transaction_id")?;
        let tx_id = TxHash::from_slice(raw)
            .ok_or_else(|| malformed(Self::NAME, format!("transaction_id: {} bytes", raw.len())))?;
        let output_index =
            plutus::expect_uint(&fields[1], Self::NAME, "output_index", u64::from(u32::MAX))?;
        Ok(Self {
            tx_id,
            output_index: output_index as u32,
        })
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Spending actions on a vault output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultRedeemer {
    Deposit { amount: u64 },
    Withdraw { amount: u64 },
    Mint { amount: u64 },
    Burn { amount: u64 },
    Liquidate,
}

impl PlutusCodec for VaultRedeemer {
    const NAME: &'static str = "VaultRedeemer";

    fn to_plutus_data(&self) -> PlutusData {
        match *self {
            Self::Deposit { amount } => plutus::constr(0, vec![plutus::uint(amount)]),
            Self::Withdraw { amount } => plutus::constr(1, vec![plutus::uint(amount)]),
            Self::Mint { amount } => plutus::constr(2, vec![plutus::uint(amount)]),
            Self::Burn { amount } => plutus::constr(3, vec![plutus::uint(amount)]),
            Self::Liquidate => plutus::constr(4, vec![]),
        }
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        let (index, fields) = plutus::expect_any_constr(data, Self::NAME)?;
        if index == 4 {
            plutus::expect_arity(fields, Self::NAME, 0)?;
            return Ok(Self::Liquidate);
        }

        plutus::expect_arity(fields, Self::NAME, 1)?;
        let amount = plutus::expect_uint(&fields[0], Self::NAME, "amount", MAX_AMOUNT)?;
        match index {
            0 => Ok(Self::Deposit { amount }),
            1 => Ok(Self::Withdraw { amount }),
            2 => Ok(Self::Mint { amount }),
            3 => Ok(Self::Burn { amount }),
            other => Err(malformed(Self::NAME, format!("unknown action {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Basket factory
// ---------------------------------------------------------------------------

/// Spending actions on a basket factory output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasketRedeemer {
    CreateBasket,
    UpdateBasket { new_weights: Vec<BasketAsset> },
}

impl PlutusCodec for BasketRedeemer {
    const NAME: &'static str = "BasketRedeemer";

    fn to_plutus_data(&self) -> PlutusData {
        match self {
            Self::CreateBasket => plutus::constr(0, vec![]),
            Self::UpdateBasket { new_weights } => {
                plutus::constr(1, vec![encode_assets(new_weights)])
            }
        }
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        match plutus::expect_any_constr(data, Self::NAME)? {
            (0, fields) => {
                plutus::expect_arity(fields, Self::NAME, 0)?;
                Ok(Self::CreateBasket)
            }
            (1, fields) => {
                plutus::expect_arity(fields, Self::NAME, 1)?;
                Ok(Self::UpdateBasket {
                    new_weights: decode_assets(&fields[0], Self::NAME)?,
                })
            }
            (other, _) => Err(malformed(Self::NAME, format!("unknown action {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Spending actions on an oracle output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleRedeemer {
    UpdatePrices { new_prices: Vec<AssetPrice> },
    ReadPrice,
}

impl PlutusCodec for OracleRedeemer {
    const NAME: &'static str = "OracleRedeemer";

    fn to_plutus_data(&self) -> PlutusData {
        match self {
            Self::UpdatePrices { new_prices } => plutus::constr(0, vec![encode_prices(new_prices)]),
            Self::ReadPrice => plutus::constr(1, vec![]),
        }
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        match plutus::expect_any_constr(data, Self::NAME)? {
            (0, fields) => {
                plutus::expect_arity(fields, Self::NAME, 1)?;
                Ok(Self::UpdatePrices {
                    new_prices: decode_prices(&fields[0], Self::NAME)?,
                })
            }
            (1, fields) => {
                plutus::expect_arity(fields, Self::NAME, 0)?;
                Ok(Self::ReadPrice)
            }
            (other, _) => Err(malformed(Self::NAME, format!("unknown action {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Token policy
// ---------------------------------------------------------------------------

/// Direction of a basket token mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintAction {
    MintTokens,
    BurnTokens,
}

/// Redeemer for the basket token minting policy. Carries the vault output
/// being spent in the same transaction so the policy can tie the mint to
/// that exact vault state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPolicyRedeemer {
    pub action: MintAction,
    pub vault_ref: OutputReference,
}

impl TokenPolicyRedeemer {
    pub fn mint(vault_ref: OutputReference) -> Self {
        Self {
            action: MintAction::MintTokens,
            vault_ref,
        }
    }

    pub fn burn(vault_ref: OutputReference) -> Self {
        Self {
            action: MintAction::BurnTokens,
            vault_ref,
        }
    }
}

impl PlutusCodec for TokenPolicyRedeemer {
    const NAME: &'static str = "TokenPolicyRedeemer";

    fn to_plutus_data(&self) -> PlutusData {
        let action = match self.action {
            MintAction::MintTokens => plutus::constr(0, vec![]),
            MintAction::BurnTokens => plutus::constr(1, vec![]),
        };
        plutus::constr(0, vec![action, self.vault_ref.to_plutus_data()])
    }

    fn from_plutus_data(data: &PlutusData) -> Result<Self, CodecError> {
        let fields = plutus::expect_constr(data, Self::NAME, 0, 2)?;
        let action = match plutus::expect_any_constr(&fields[0], Self::NAME)? {
            (0, []) => MintAction::MintTokens,
            (1, []) => MintAction::BurnTokens,
            (index, _) => {
                return Err(malformed(Self::NAME, format!("invalid mint action {index}")));
            }
        };
        Ok(Self {
            action,
            vault_ref: OutputReference::from_plutus_data(&fields[1])?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn vault_ref() -> OutputReference {
        OutputReference::new(TxHash::new([0xaa; 32]), 1)
    }

    #[test]
    fn vault_redeemer_ordinals() {
        let cases = [
            (VaultRedeemer::Deposit { amount: 5 }, 0),
            (VaultRedeemer::Withdraw { amount: 5 }, 1),
            (VaultRedeemer::Mint { amount: 5 }, 2),
            (VaultRedeemer::Burn { amount: 5 }, 3),
            (VaultRedeemer::Liquidate, 4),
        ];
        for (redeemer, ordinal) in cases {
            let data = redeemer.to_plutus_data();
            let (index, _) = plutus::expect_any_constr(&data, "test").unwrap();
            assert_eq!(index, ordinal);
            let bytes = redeemer.encode().unwrap();
            assert_eq!(VaultRedeemer::decode(&bytes).unwrap(), redeemer);
        }
    }

    #[test]
    fn liquidate_is_nullary() {
        assert_eq!(
            VaultRedeemer::Liquidate.encode().unwrap(),
            vec![0xd8, 0x7d, 0x80]
        );
    }

    #[test]
    fn mint_amount_encoding() {
        // Constr 2 [1_000_000] => tag 123, indefinite array, uint32.
        assert_eq!(
            VaultRedeemer::Mint { amount: 1_000_000 }.encode().unwrap(),
            vec![0xd8, 0x7b, 0x9f, 0x1a, 0x00, 0x0f, 0x42, 0x40, 0xff]
        );
    }

    #[test]
    fn create_basket_is_empty_constructor_zero() {
        assert_eq!(
            BasketRedeemer::CreateBasket.encode().unwrap(),
            vec![0xd8, 0x79, 0x80]
        );
    }

    #[test]
    fn update_basket_roundtrip() {
        let redeemer = BasketRedeemer::UpdateBasket {
            new_weights: vec![BasketAsset::new("SOL", 2_500), BasketAsset::new("DOT", 7_500)],
        };
        let bytes = redeemer.encode().unwrap();
        assert_eq!(BasketRedeemer::decode(&bytes).unwrap(), redeemer);
    }

    #[test]
    fn oracle_redeemer_roundtrip() {
        let redeemer = OracleRedeemer::UpdatePrices {
            new_prices: vec![AssetPrice::new("ADA", 450_000)],
        };
        assert_eq!(
            OracleRedeemer::decode(&redeemer.encode().unwrap()).unwrap(),
            redeemer
        );
        assert_eq!(
            OracleRedeemer::decode(&OracleRedeemer::ReadPrice.encode().unwrap()).unwrap(),
            OracleRedeemer::ReadPrice
        );
    }

    #[test]
    fn token_policy_redeemer_shape() {
        let redeemer = TokenPolicyRedeemer::burn(vault_ref());
        let data = redeemer.to_plutus_data();
        let fields = plutus::expect_constr(&data, "test", 0, 2).unwrap();
        let (action, action_fields) = plutus::expect_any_constr(&fields[0], "test").unwrap();
        assert_eq!(action, 1);
        assert!(action_fields.is_empty());
        let out_ref = plutus::expect_constr(&fields[1], "test", 0, 2).unwrap();
        assert_eq!(plutus::expect_bytes(&out_ref[0], "test", "id").unwrap(), &[0xaa; 32]);

        let bytes = redeemer.encode().unwrap();
        assert_eq!(TokenPolicyRedeemer::decode(&bytes).unwrap(), redeemer);
    }

    #[test]
    fn unknown_vault_action_is_rejected() {
        let bytes = plutus::to_cbor(&plutus::constr(5, vec![plutus::uint(1)])).unwrap();
        assert!(VaultRedeemer::decode(&bytes).is_err());
    }

    #[test]
    fn output_reference_display() {
        assert_eq!(vault_ref().to_string(), format!("{}#1", "aa".repeat(32)));
    }
}
