//! Subcommand handlers.
//!
//! Each handler returns what the binary prints on stdout, so the same code
//! path is exercised by the tests below.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use equibasket_protocol::chain::InMemoryLedger;
use equibasket_protocol::codec::{
    AssetPrice, BasketAsset, BasketDatum, BasketRedeemer, CredentialHash, OracleDatum,
    OracleRedeemer, PlutusCodec, TokenPolicyRedeemer, VaultDatum, VaultRedeemer,
};
use equibasket_protocol::config::{
    NetworkConfig, ValuationConfig, DEFAULT_ORACLE_PRICES, LOVELACE_PER_ADA,
    MIN_COLLATERAL_RATIO_BPS, TX_VALIDITY_WINDOW,
};
use equibasket_protocol::storage::EquiBasketDb;
use equibasket_protocol::valuation::{
    basket_price, collateral_ratio, format_token_amount, is_healthy, validate_weights,
};
use equibasket_protocol::EquiBasketClient;

use crate::cli::{HealthArgs, RecordKind, SimulateArgs};

// ---------------------------------------------------------------------------
// encode / decode
// ---------------------------------------------------------------------------

/// Parses `json` as a record of `kind` and returns its hex CBOR.
pub fn encode(kind: RecordKind, json: &str) -> Result<String> {
    match kind {
        RecordKind::Oracle => encode_as::<OracleDatum>(json),
        RecordKind::Basket => {
            let basket: BasketDatum = parse(json)?;
            validate_weights(&basket.assets)?;
            checked_hex(&basket)
        }
        RecordKind::Vault => encode_as::<VaultDatum>(json),
        RecordKind::VaultRedeemer => encode_as::<VaultRedeemer>(json),
        RecordKind::BasketRedeemer => encode_as::<BasketRedeemer>(json),
        RecordKind::OracleRedeemer => encode_as::<OracleRedeemer>(json),
        RecordKind::PolicyRedeemer => encode_as::<TokenPolicyRedeemer>(json),
    }
}

/// Decodes hex CBOR as a record of `kind` and renders it as JSON.
pub fn decode(kind: RecordKind, hex: &str) -> Result<String> {
    match kind {
        RecordKind::Oracle => decode_as::<OracleDatum>(hex),
        RecordKind::Basket => decode_as::<BasketDatum>(hex),
        RecordKind::Vault => decode_as::<VaultDatum>(hex),
        RecordKind::VaultRedeemer => decode_as::<VaultRedeemer>(hex),
        RecordKind::BasketRedeemer => decode_as::<BasketRedeemer>(hex),
        RecordKind::OracleRedeemer => decode_as::<OracleRedeemer>(hex),
        RecordKind::PolicyRedeemer => decode_as::<TokenPolicyRedeemer>(hex),
    }
}

fn parse<T: PlutusCodec + DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).with_context(|| format!("invalid {} JSON", T::NAME))
}

fn encode_as<T: PlutusCodec + DeserializeOwned>(json: &str) -> Result<String> {
    checked_hex(&parse::<T>(json)?)
}

fn checked_hex<T: PlutusCodec>(record: &T) -> Result<String> {
    let hex = record.to_hex().with_context(|| format!("cannot encode {}", T::NAME))?;
    tracing::debug!(record = T::NAME, bytes = hex.len() / 2, "encoded");
    Ok(hex)
}

fn decode_as<T: PlutusCodec + Serialize>(hex: &str) -> Result<String> {
    let record = T::from_hex(hex).with_context(|| format!("cannot decode {}", T::NAME))?;
    Ok(serde_json::to_string_pretty(&record)?)
}

// ---------------------------------------------------------------------------
// price / health
// ---------------------------------------------------------------------------

/// Prices a basket datum against an oracle datum.
pub fn price(oracle_hex: &str, basket_hex: &str) -> Result<Value> {
    let oracle = OracleDatum::from_hex(oracle_hex).context("cannot decode oracle datum")?;
    let basket = BasketDatum::from_hex(basket_hex).context("cannot decode basket datum")?;
    let price = basket_price(&basket.assets, &oracle)?;

    Ok(json!({
        "basket_id": basket.basket_id,
        "name": basket.name,
        "price_micro_usd": price,
        "price_usd": format_token_amount(price),
        "oracle_updated": oracle.last_updated,
    }))
}

/// Ratio and health of a collateral/debt pair.
pub fn health(args: &HealthArgs) -> Value {
    let ratio = collateral_ratio(args.collateral_usd, args.minted_usd);
    json!({
        "ratio": ratio.to_string(),
        "ratio_bps": ratio.bps(),
        "threshold_bps": args.threshold_bps,
        "healthy": is_healthy(args.collateral_usd, args.minted_usd, args.threshold_bps),
    })
}

// ---------------------------------------------------------------------------
// simulate
// ---------------------------------------------------------------------------

/// Placeholder deployment for dry runs: no real script lives here.
fn dry_run_network() -> NetworkConfig {
    NetworkConfig {
        oracle_address: "addr_test1_dry_run_oracle".into(),
        basket_factory_address: "addr_test1_dry_run_factory".into(),
        vault_address: "addr_test1_dry_run_vault".into(),
        token_policy_id: "00".repeat(28),
        validity_window_ms: TX_VALIDITY_WINDOW.as_millis() as u64,
        valuation: ValuationConfig::default(),
    }
}

pub fn load_network(args: &SimulateArgs) -> Result<NetworkConfig> {
    match &args.network {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            NetworkConfig::from_json(&raw)
                .with_context(|| format!("invalid network config in {}", path.display()))
        }
        None => Ok(dry_run_network()),
    }
}

/// Publishes the default price table, creates a BTC/ETH basket, opens a
/// vault and mints against it, all on an in-memory ledger.
pub async fn simulate(args: &SimulateArgs, network: NetworkConfig) -> Result<Value> {
    let ledger = Arc::new(InMemoryLedger::new());
    let db = EquiBasketDb::open_temporary().context("failed to open temporary store")?;
    let signer = CredentialHash::new([0x11; 28]);
    let client =
        EquiBasketClient::new(Arc::clone(&ledger), Arc::clone(&ledger), db, network, signer)?;

    let prices = DEFAULT_ORACLE_PRICES
        .iter()
        .map(|(symbol, _, price)| AssetPrice::new(*symbol, *price))
        .collect();
    client.publish_oracle(prices).await?;
    client
        .create_basket(
            "DEMO",
            "Bitcoin & Ether",
            vec![BasketAsset::new("BTC", 5_000), BasketAsset::new("ETH", 5_000)],
        )
        .await?;

    let lovelace = args
        .ada
        .checked_mul(LOVELACE_PER_ADA)
        .context("collateral overflows u64 lovelace")?;
    client.open_vault("DEMO", lovelace).await?;
    client.mint("DEMO", &args.mint).await?;

    let position = client.vault_position("DEMO").await?;
    let cfg = client.network().valuation;
    Ok(json!({
        "basket_price_usd": format_token_amount(position.basket_price),
        "collateral_usd": format_token_amount(position.collateral_value_usd()),
        "debt_usd": format_token_amount(position.debt_value_usd()),
        "minted": format_token_amount(position.vault.minted_token_units),
        "ratio": position.ratio().to_string(),
        "healthy": position.is_healthy(&cfg),
        "max_additional_mint": format_token_amount(position.max_mintable_units(&cfg)),
        "min_ratio_bps": cfg.min_collateral_ratio_bps,
        "transactions": ledger.submitted().len(),
    }))
}

/// Lines printed by `version`.
pub fn version_lines() -> Vec<String> {
    vec![
        format!("equibasket {}", env!("CARGO_PKG_VERSION")),
        format!("min ratio  {MIN_COLLATERAL_RATIO_BPS} bps"),
        format!("validity   {} s", TX_VALIDITY_WINDOW.as_secs()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BASKET_JSON: &str = r#"{
        "basket_id": "DUO",
        "name": "Duo",
        "assets": [{"id": "BTC", "weight": 5000}, {"id": "ETH", "weight": 5000}],
        "creator": "07070707070707070707070707070707070707070707070707070707",
        "created_at": 1700000000000
    }"#;

    const ORACLE_JSON: &str = r#"{
        "prices": [
            {"symbol": "BTC", "price_micro_usd": 60000000000},
            {"symbol": "ETH", "price_micro_usd": 3000000000}
        ],
        "last_updated": 1700000000000,
        "admin": "07070707070707070707070707070707070707070707070707070707"
    }"#;

    #[test]
    fn encode_then_price() {
        let oracle = encode(RecordKind::Oracle, ORACLE_JSON).unwrap();
        let basket = encode(RecordKind::Basket, BASKET_JSON).unwrap();

        let out = price(&oracle, &basket).unwrap();
        assert_eq!(out["price_micro_usd"], 31_500_000_000u64);
        assert_eq!(out["price_usd"], "31500");
    }

    #[test]
    fn decode_renders_json() {
        let hex = encode(RecordKind::Basket, BASKET_JSON).unwrap();
        let out = decode(RecordKind::Basket, &hex).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["basket_id"], "DUO");
        assert_eq!(value["assets"][1]["weight"], 5000);
    }

    #[test]
    fn bad_weights_are_not_encoded() {
        let json = BASKET_JSON.replace("\"weight\": 5000}]", "\"weight\": 4000}]");
        assert!(encode(RecordKind::Basket, &json).is_err());
    }

    #[test]
    fn out_of_range_vault_is_not_encoded() {
        let json = r#"{
            "owner": "07070707070707070707070707070707070707070707070707070707",
            "basket_id": "DUO",
            "collateral_lovelace": 18446744073709551615,
            "minted_token_units": 0,
            "created_at": 0
        }"#;
        let err = encode(RecordKind::Vault, json).unwrap_err();
        assert!(format!("{err:#}").contains("18446744073709551615"));
    }

    #[test]
    fn duplicate_oracle_symbols_are_not_encoded() {
        let json = ORACLE_JSON.replace("\"ETH\"", "\"BTC\"");
        assert!(encode(RecordKind::Oracle, &json).is_err());
    }

    #[test]
    fn wrong_kind_fails_to_decode() {
        let hex = encode(RecordKind::Basket, BASKET_JSON).unwrap();
        assert!(decode(RecordKind::Vault, &hex).is_err());
    }

    #[test]
    fn health_boundaries() {
        let args = |c, m| HealthArgs {
            collateral_usd: c,
            minted_usd: m,
            threshold_bps: MIN_COLLATERAL_RATIO_BPS,
        };
        let at = health(&args(300_000_000, 200_000_000));
        assert_eq!(at["ratio"], "150.00%");
        assert_eq!(at["healthy"], true);

        let below = health(&args(149_000_000, 100_000_000));
        assert_eq!(below["ratio"], "149.00%");
        assert_eq!(below["healthy"], false);

        let debt_free = health(&args(1, 0));
        assert_eq!(debt_free["ratio_bps"], Value::Null);
        assert_eq!(debt_free["healthy"], true);
    }

    #[tokio::test]
    async fn simulate_default_run() {
        let args = SimulateArgs {
            ada: 1_000,
            mint: "0.01".into(),
            network: None,
        };
        let out = simulate(&args, dry_run_network()).await.unwrap();
        assert_eq!(out["basket_price_usd"], "31500");
        assert_eq!(out["collateral_usd"], "500");
        assert_eq!(out["debt_usd"], "315");
        assert_eq!(out["healthy"], true);
        assert_eq!(out["transactions"], 4);
    }

    #[tokio::test]
    async fn simulate_rejects_overmint() {
        let args = SimulateArgs {
            ada: 1_000,
            mint: "1".into(),
            network: None,
        };
        assert!(simulate(&args, dry_run_network()).await.is_err());
    }

    #[test]
    fn network_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "oracle_address": "addr_o",
                "basket_factory_address": "addr_b",
                "vault_address": "addr_v",
                "token_policy_id": "{}"
            }}"#,
            "ab".repeat(28)
        )
        .unwrap();
        let args = SimulateArgs {
            ada: 1,
            mint: "1".into(),
            network: Some(file.path().to_path_buf()),
        };
        let cfg = load_network(&args).unwrap();
        assert_eq!(cfg.vault_address, "addr_v");
        assert_eq!(cfg.validity_window_ms, 900_000);
    }
}
