//! Write actions: oracle publish, basket creation and the vault lifecycle.

use std::collections::HashSet;

use tracing::{debug, error, info, info_span, Instrument};

use super::{ClientError, ClientResult, EquiBasketClient, Market};
use crate::chain::{
    select_basket, select_vault, Selected, TxKind, TxRequest, TxRequestBuilder, TxSubmitter,
    UtxoQuery,
};
use crate::codec::{
    AssetPrice, BasketAsset, BasketDatum, OracleDatum, PlutusCodec, TokenPolicyRedeemer, TxHash,
    VaultDatum, VaultRedeemer,
};
use crate::config::{asset_display_name, MIN_UTXO_LOVELACE, MIN_VAULT_DEPOSIT_LOVELACE};
use crate::storage::{BasketRecord, DbError, OraclePriceRecord, VaultRecord};
use crate::valuation::{parse_token_amount, ValuationError, VaultPosition};

impl<Q: UtxoQuery, S: TxSubmitter> EquiBasketClient<Q, S> {
    /// Publishes a new oracle snapshot signed by the client's key.
    pub async fn publish_oracle(&self, prices: Vec<AssetPrice>) -> ClientResult<TxHash> {
        let span = info_span!("publish_oracle", assets = prices.len());
        async move {
            let mut seen = HashSet::with_capacity(prices.len());
            for price in &prices {
                if !seen.insert(price.symbol.as_str()) {
                    return Err(ClientError::DuplicateAsset(price.symbol.clone()));
                }
            }

            let now = self.now();
            let datum = OracleDatum {
                prices,
                last_updated: now,
                admin: self.signer,
            };
            let request = TxRequestBuilder::new(TxKind::PublishOracle)
                .pay_to(&self.network.oracle_address, MIN_UTXO_LOVELACE, Some(datum.encode()?))
                .valid_to(self.valid_to())
                .build();
            let tx_hash = self.submitter.submit(request).await?;

            for price in &datum.prices {
                self.db.upsert_oracle_price(&OraclePriceRecord {
                    asset_id: price.symbol.clone(),
                    asset_name: asset_display_name(&price.symbol)
                        .unwrap_or(&price.symbol)
                        .to_string(),
                    price_micro_usd: price.price_micro_usd,
                    updated_at: now,
                })?;
            }

            info!(%tx_hash, "oracle published");
            Ok(tx_hash)
        }
        .instrument(span)
        .await
    }

    /// Creates a basket definition at the basket factory.
    pub async fn create_basket(
        &self,
        basket_id: &str,
        name: &str,
        assets: Vec<BasketAsset>,
    ) -> ClientResult<TxHash> {
        let span = info_span!("create_basket", basket_id);
        async move {
            if self.db.get_basket(basket_id)?.is_some() {
                return Err(DbError::AlreadyExists(format!("basket {basket_id}")).into());
            }
            let factory = self
                .query
                .utxos_at(&self.network.basket_factory_address)
                .await?;
            if let Some(existing) = select_basket(&factory, basket_id) {
                debug!(creator = %existing.datum.creator, "basket id already on chain");
                return Err(ClientError::BasketExists(basket_id.to_string()));
            }

            let datum = BasketDatum::new(basket_id, name, assets, self.signer, self.now())?;
            let request = TxRequestBuilder::new(TxKind::CreateBasket)
                .pay_to(
                    &self.network.basket_factory_address,
                    MIN_UTXO_LOVELACE,
                    Some(datum.encode()?),
                )
                .signer(self.signer)
                .valid_to(self.valid_to())
                .build();
            let tx_hash = self.submitter.submit(request).await?;

            if let Err(e) = self.db.create_basket(&BasketRecord::pending(&datum, tx_hash)) {
                // The transaction is already out; keep its id findable.
                error!(%tx_hash, error = %e, "basket submitted but its row was not stored");
                return Err(e.into());
            }
            info!(%tx_hash, assets = datum.assets.len(), "basket created");
            Ok(tx_hash)
        }
        .instrument(span)
        .await
    }

    /// Opens a vault for `basket_id` with `lovelace` of collateral.
    pub async fn open_vault(&self, basket_id: &str, lovelace: u64) -> ClientResult<TxHash> {
        let span = info_span!("open_vault", basket_id, lovelace);
        async move {
            if lovelace < MIN_VAULT_DEPOSIT_LOVELACE {
                return Err(ClientError::DepositBelowMinimum {
                    lovelace,
                    minimum: MIN_VAULT_DEPOSIT_LOVELACE,
                });
            }

            self.current_basket(basket_id).await?;
            let existing = self.query.utxos_at(&self.network.vault_address).await?;
            if select_vault(&existing, &self.signer, basket_id).is_some() {
                return Err(ClientError::VaultExists(basket_id.to_string()));
            }

            let now = self.now();
            let datum = VaultDatum::open(self.signer, basket_id, lovelace, now);
            let request = TxRequestBuilder::new(TxKind::OpenVault)
                .pay_to(&self.network.vault_address, lovelace, Some(datum.encode()?))
                .signer(self.signer)
                .valid_to(self.valid_to())
                .build();
            let tx_hash = self.submitter.submit(request).await?;

            self.db.upsert_vault(&VaultRecord::pending(&datum, tx_hash, now))?;
            info!(%tx_hash, "vault opened");
            Ok(tx_hash)
        }
        .instrument(span)
        .await
    }

    /// Adds `lovelace` of collateral to the signer's vault.
    pub async fn deposit(&self, basket_id: &str, lovelace: u64) -> ClientResult<TxHash> {
        let span = info_span!("deposit", basket_id, lovelace);
        async move {
            let vault = self.current_vault(basket_id).await?;
            // Adding collateral never lowers the ratio, so no prices are read.
            let next = VaultPosition::new(vault.datum.clone(), 0, 0).deposit(lovelace)?;

            let request = self
                .vault_transition(TxKind::Deposit, &vault, &next, VaultRedeemer::Deposit {
                    amount: lovelace,
                })?
                .build();
            self.submit_vault(request, &next).await
        }
        .instrument(span)
        .await
    }

    /// Releases `lovelace` of collateral, keeping the vault healthy.
    pub async fn withdraw(&self, basket_id: &str, lovelace: u64) -> ClientResult<TxHash> {
        let span = info_span!("withdraw", basket_id, lovelace);
        async move {
            let (market, vault, position) = self.load_position(basket_id).await?;
            let next = position.withdraw(lovelace, &self.network.valuation)?;

            let request = self
                .vault_transition(TxKind::Withdraw, &vault, &next, VaultRedeemer::Withdraw {
                    amount: lovelace,
                })?;
            let request = read_market(request, &market).build();
            self.submit_vault(request, &next).await
        }
        .instrument(span)
        .await
    }

    /// Mints `display_amount` basket tokens (e.g. `"1.5"`) against the
    /// signer's vault.
    pub async fn mint(&self, basket_id: &str, display_amount: &str) -> ClientResult<TxHash> {
        let span = info_span!("mint", basket_id, amount = display_amount);
        async move {
            let units = parse_token_amount(display_amount)?;
            let (market, vault, position) = self.load_position(basket_id).await?;
            let next = position.mint(units, &self.network.valuation)?;
            debug!(units, debt = next.minted_token_units, "mint validated");

            let policy_redeemer = TokenPolicyRedeemer::mint(vault.utxo.out_ref()).encode()?;
            let request = self
                .vault_transition(TxKind::Mint, &vault, &next, VaultRedeemer::Mint { amount: units })?
                .mint(
                    &self.network.token_policy_id,
                    basket_id.as_bytes(),
                    signed(units)?,
                    policy_redeemer,
                );
            let request = read_market(request, &market).build();
            self.submit_vault(request, &next).await
        }
        .instrument(span)
        .await
    }

    /// Burns `display_amount` basket tokens, reducing the vault's debt.
    pub async fn burn(&self, basket_id: &str, display_amount: &str) -> ClientResult<TxHash> {
        let span = info_span!("burn", basket_id, amount = display_amount);
        async move {
            let units = parse_token_amount(display_amount)?;
            let (market, vault, position) = self.load_position(basket_id).await?;
            let next = position.burn(units)?;

            let policy_redeemer = TokenPolicyRedeemer::burn(vault.utxo.out_ref()).encode()?;
            let request = self
                .vault_transition(TxKind::Burn, &vault, &next, VaultRedeemer::Burn { amount: units })?
                .mint(
                    &self.network.token_policy_id,
                    basket_id.as_bytes(),
                    -signed(units)?,
                    policy_redeemer,
                );
            let request = read_market(request, &market).build();
            self.submit_vault(request, &next).await
        }
        .instrument(span)
        .await
    }

    /// Spends the current vault output and recreates it with `next`.
    fn vault_transition(
        &self,
        kind: TxKind,
        current: &Selected<VaultDatum>,
        next: &VaultDatum,
        redeemer: VaultRedeemer,
    ) -> ClientResult<TxRequestBuilder> {
        Ok(TxRequestBuilder::new(kind)
            .spend(current.utxo.out_ref(), redeemer.encode()?)
            .pay_to(
                &self.network.vault_address,
                next.collateral_lovelace,
                Some(next.encode()?),
            )
            .signer(self.signer)
            .valid_to(self.valid_to()))
    }

    async fn submit_vault(&self, request: TxRequest, next: &VaultDatum) -> ClientResult<TxHash> {
        let kind = request.kind;
        let tx_hash = self.submitter.submit(request).await?;
        self.db
            .upsert_vault(&VaultRecord::pending(next, tx_hash, self.now()))?;
        info!(
            %tx_hash,
            %kind,
            collateral = next.collateral_lovelace,
            minted = next.minted_token_units,
            "vault updated"
        );
        Ok(tx_hash)
    }
}

fn read_market(builder: TxRequestBuilder, market: &Market) -> TxRequestBuilder {
    builder
        .read(market.oracle.utxo.out_ref())
        .read(market.basket.utxo.out_ref())
}

fn signed(units: u64) -> ClientResult<i64> {
    i64::try_from(units).map_err(|_| {
        ValuationError::AmountOutOfRange {
            amount: units.to_string(),
        }
        .into()
    })
}
