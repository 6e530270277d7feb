//! # EquiBasket Client
//!
//! One async method per user action. Every write follows the same
//! sequence:
//!
//! ```text
//! query UTxOs → decode datums → validate → build successor + redeemers
//!             → encode → submit TxRequest → persist rows (Pending)
//! ```
//!
//! Nothing is persisted unless the submitter returned a transaction id,
//! and nothing is retried. Callers sequence actions one at a time; the
//! client holds no locks of its own.

mod actions;
pub mod error;

use serde::{Deserialize, Serialize};

use crate::chain::{select_basket, select_oracle, select_vault, ChainError, Selected};
use crate::chain::{TxSubmitter, UtxoQuery};
use crate::codec::{BasketDatum, CredentialHash, OracleDatum, VaultDatum};
use crate::config::{NetworkConfig, CREDENTIAL_HASH_LENGTH};
use crate::storage::EquiBasketDb;
use crate::valuation::{basket_price, VaultPosition};

pub use error::{ClientError, ClientResult};

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// A basket priced at the current oracle snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketValuation {
    pub basket: BasketDatum,
    /// Micro-USD per whole basket token.
    pub price_micro_usd: u64,
    /// Publication time of the oracle snapshot used.
    pub oracle_updated: u64,
}

/// The oracle and basket outputs a vault action reads.
struct Market {
    oracle: Selected<OracleDatum>,
    basket: Selected<BasketDatum>,
}

/// Action client over a UTxO provider, a submitter and the local store.
pub struct EquiBasketClient<Q, S> {
    query: Q,
    submitter: S,
    db: EquiBasketDb,
    network: NetworkConfig,
    signer: CredentialHash,
    clock: fn() -> u64,
}

impl<Q: UtxoQuery, S: TxSubmitter> EquiBasketClient<Q, S> {
    /// Creates a client acting as `signer`.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidConfig`] if the token policy id is not a
    /// 28-byte hex string.
    pub fn new(
        query: Q,
        submitter: S,
        db: EquiBasketDb,
        network: NetworkConfig,
        signer: CredentialHash,
    ) -> ClientResult<Self> {
        let policy = hex::decode(&network.token_policy_id)
            .map_err(|e| ClientError::InvalidConfig(format!("token_policy_id: {e}")))?;
        if policy.len() != CREDENTIAL_HASH_LENGTH {
            return Err(ClientError::InvalidConfig(format!(
                "token_policy_id: expected {CREDENTIAL_HASH_LENGTH} bytes, found {}",
                policy.len()
            )));
        }

        Ok(Self {
            query,
            submitter,
            db,
            network,
            signer,
            clock: now_ms,
        })
    }

    /// Replaces the wall clock, for deterministic timestamps.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn signer(&self) -> &CredentialHash {
        &self.signer
    }

    pub fn db(&self) -> &EquiBasketDb {
        &self.db
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    fn valid_to(&self) -> u64 {
        self.now().saturating_add(self.network.validity_window_ms)
    }

    // -- Reads --------------------------------------------------------------

    /// The oracle output currently in force.
    pub async fn current_oracle(&self) -> ClientResult<Selected<OracleDatum>> {
        let address = &self.network.oracle_address;
        let utxos = self.query.utxos_at(address).await?;
        select_oracle(&utxos).ok_or_else(|| not_found("oracle", address))
    }

    /// The definition output of `basket_id`.
    pub async fn current_basket(&self, basket_id: &str) -> ClientResult<Selected<BasketDatum>> {
        let address = &self.network.basket_factory_address;
        let utxos = self.query.utxos_at(address).await?;
        select_basket(&utxos, basket_id).ok_or_else(|| not_found("basket", address))
    }

    /// The signer's vault output for `basket_id`.
    pub async fn current_vault(&self, basket_id: &str) -> ClientResult<Selected<VaultDatum>> {
        let address = &self.network.vault_address;
        let utxos = self.query.utxos_at(address).await?;
        select_vault(&utxos, &self.signer, basket_id).ok_or_else(|| not_found("vault", address))
    }

    async fn market(&self, basket_id: &str) -> ClientResult<Market> {
        Ok(Market {
            oracle: self.current_oracle().await?,
            basket: self.current_basket(basket_id).await?,
        })
    }

    /// Prices `basket_id` at the current oracle snapshot.
    pub async fn basket_valuation(&self, basket_id: &str) -> ClientResult<BasketValuation> {
        let Market { oracle, basket } = self.market(basket_id).await?;
        let price_micro_usd = basket_price(&basket.datum.assets, &oracle.datum)?;
        Ok(BasketValuation {
            basket: basket.datum,
            price_micro_usd,
            oracle_updated: oracle.datum.last_updated,
        })
    }

    async fn load_position(
        &self,
        basket_id: &str,
    ) -> ClientResult<(Market, Selected<VaultDatum>, VaultPosition)> {
        let market = self.market(basket_id).await?;
        let vault = self.current_vault(basket_id).await?;
        let position = VaultPosition::from_oracle(
            vault.datum.clone(),
            &market.basket.datum,
            &market.oracle.datum,
        )?;
        Ok((market, vault, position))
    }

    /// The signer's vault for `basket_id`, valued at current prices.
    pub async fn vault_position(&self, basket_id: &str) -> ClientResult<VaultPosition> {
        let (_, _, position) = self.load_position(basket_id).await?;
        Ok(position)
    }
}

fn not_found(kind: &'static str, address: &str) -> ClientError {
    ChainError::NotFound {
        kind,
        address: address.to_string(),
    }
    .into()
}
