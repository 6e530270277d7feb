//! # Protocol Configuration & Constants
//!
//! Every magic number the off-chain core shares with the on-chain scripts
//! lives here. The validators were compiled against these exact values, so
//! changing one here without redeploying the scripts produces transactions
//! the ledger will reject.
//!
//! Runtime-tunable settings (script addresses, policy id, validity window)
//! live in [`NetworkConfig`], which is loaded from JSON by the CLI and
//! handed to the [`crate::client::EquiBasketClient`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fixed-Point Precision
// ---------------------------------------------------------------------------

/// Oracle prices are quoted in micro-USD: `1_000_000` = $1.00.
pub const PRICE_PRECISION: u64 = 1_000_000;

/// Basket weights are basis points. A complete basket sums to exactly this.
pub const WEIGHT_PRECISION: u64 = 10_000;

/// Denominator for ratios expressed in basis points (`15_000` = 150%).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Minimum collateral ratio enforced by the vault script, in basis points.
/// 150%: one and a half dollars of ADA for every dollar of basket tokens.
pub const MIN_COLLATERAL_RATIO_BPS: u64 = 15_000;

/// Basket tokens carry six decimals on-chain. 1 token = 1_000_000 units.
pub const TOKEN_DECIMALS: u32 = 6;

/// On-chain units per display token (`10^TOKEN_DECIMALS`).
pub const TOKEN_UNIT: u64 = 1_000_000;

/// Lovelace per ADA.
pub const LOVELACE_PER_ADA: u64 = 1_000_000;

/// Upper bound for every amount field in a datum. The ledger's integers are
/// unbounded, but the validators treat amounts as signed 64-bit values.
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

// ---------------------------------------------------------------------------
// Ledger Parameters
// ---------------------------------------------------------------------------

/// Blake2b-224 credential hashes (payment key hashes, script hashes).
pub const CREDENTIAL_HASH_LENGTH: usize = 28;

/// Transaction ids are Blake2b-256 digests.
pub const TX_ID_LENGTH: usize = 32;

/// Lovelace locked alongside oracle and basket datums. Enough to cover the
/// min-UTxO requirement for an inline datum of a few hundred bytes.
pub const MIN_UTXO_LOVELACE: u64 = 5_000_000;

/// Smallest deposit the UI lets a user open a vault with (2 ADA).
pub const MIN_VAULT_DEPOSIT_LOVELACE: u64 = 2_000_000;

/// How long a built transaction stays valid after construction.
pub const TX_VALIDITY_WINDOW: Duration = Duration::from_secs(15 * 60);

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Oracle symbol used to value vault collateral.
pub const ORACLE_ASSET_ADA: &str = "ADA";

/// Price table published when an operator deploys a fresh oracle:
/// `(symbol, display name, micro-USD price)`.
pub const DEFAULT_ORACLE_PRICES: &[(&str, &str, u64)] = &[
    ("BTC", "Bitcoin", 60_000 * PRICE_PRECISION),
    ("ETH", "Ethereum", 3_000 * PRICE_PRECISION),
    ("SOL", "Solana", 150 * PRICE_PRECISION),
    ("ADA", "Cardano", 500_000),
    ("LINK", "Chainlink", 15 * PRICE_PRECISION),
    ("DOT", "Polkadot", 7 * PRICE_PRECISION),
];

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Valuation thresholds. Defaults mirror the deployed vault script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Minimum healthy collateral ratio in basis points.
    pub min_collateral_ratio_bps: u64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            min_collateral_ratio_bps: MIN_COLLATERAL_RATIO_BPS,
        }
    }
}

/// Script addresses and policy for one deployment of the EquiBasket
/// validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bech32 address of the mock oracle script.
    pub oracle_address: String,
    /// Bech32 address of the basket factory script.
    pub basket_factory_address: String,
    /// Bech32 address of the (parameterized) vault script.
    pub vault_address: String,
    /// Hex-encoded policy id of the basket token minting policy.
    pub token_policy_id: String,
    /// Validity window for built transactions, in milliseconds.
    #[serde(default = "default_validity_window_ms")]
    pub validity_window_ms: u64,
    /// Valuation thresholds.
    #[serde(default)]
    pub valuation: ValuationConfig,
}

fn default_validity_window_ms() -> u64 {
    TX_VALIDITY_WINDOW.as_millis() as u64
}

impl NetworkConfig {
    /// Parses a deployment description from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Returns the display name for a known oracle symbol.
pub fn asset_display_name(symbol: &str) -> Option<&'static str> {
    DEFAULT_ORACLE_PRICES
        .iter()
        .find(|(s, _, _)| *s == symbol)
        .map(|(_, name, _)| *name)
}
