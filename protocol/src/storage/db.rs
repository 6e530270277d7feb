//! # EquiBasketDb: Off-Chain Store
//!
//! Embedded sled database holding the rows the UI lists: baskets, the
//! last known oracle prices, and each user's vaults.
//!
//! ## Tree Layout
//!
//! | Tree            | Key                             | Value                     |
//! |-----------------|---------------------------------|---------------------------|
//! | `baskets`       | `basket_id` (UTF-8)             | `bincode(BasketRecord)`   |
//! | `oracle_prices` | `asset_id` (UTF-8)              | `bincode(OraclePriceRecord)` |
//! | `vaults`        | `owner` (28B) `\0` `basket_id`  | `bincode(VaultRecord)`    |
//!
//! Vault keys start with the raw owner hash so that listing a user's
//! vaults is a prefix scan.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};

use super::records::{BasketRecord, OraclePriceRecord, RecordStatus, VaultRecord};
use crate::codec::{CredentialHash, TxHash};
use crate::config::DEFAULT_ORACLE_PRICES;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type DbResult<T> = Result<T, DbError>;

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

fn get<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> DbResult<Option<T>> {
    tree.get(key)?.map(|bytes| decode(&bytes)).transpose()
}

fn scan<T: DeserializeOwned>(tree: &Tree, prefix: &[u8]) -> DbResult<Vec<T>> {
    tree.scan_prefix(prefix)
        .map(|entry| {
            let (_key, value) = entry?;
            decode(&value)
        })
        .collect()
}

fn vault_key(owner: &CredentialHash, basket_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.as_bytes().len() + 1 + basket_id.len());
    key.extend_from_slice(owner.as_bytes());
    key.push(0x00);
    key.extend_from_slice(basket_id.as_bytes());
    key
}

// ---------------------------------------------------------------------------
// EquiBasketDb
// ---------------------------------------------------------------------------

/// Persistent store for basket, oracle-price and vault rows.
///
/// Cloning is cheap; clones share the same underlying database.
#[derive(Debug, Clone)]
pub struct EquiBasketDb {
    db: Db,
    baskets: Tree,
    oracle_prices: Tree,
    vaults: Tree,
}

impl EquiBasketDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let baskets = db.open_tree("baskets")?;
        let oracle_prices = db.open_tree("oracle_prices")?;
        let vaults = db.open_tree("vaults")?;

        Ok(Self {
            db,
            baskets,
            oracle_prices,
            vaults,
        })
    }

    // -- Baskets ------------------------------------------------------------

    /// Inserts a new basket. Basket ids are unique; a second insert with
    /// the same id fails with [`DbError::AlreadyExists`].
    pub fn create_basket(&self, record: &BasketRecord) -> DbResult<()> {
        let bytes = encode(record)?;
        self.baskets
            .compare_and_swap(record.basket_id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| DbError::AlreadyExists(format!("basket {}", record.basket_id)))?;
        tracing::debug!(basket_id = %record.basket_id, "basket row created");
        Ok(())
    }

    pub fn get_basket(&self, basket_id: &str) -> DbResult<Option<BasketRecord>> {
        get(&self.baskets, basket_id.as_bytes())
    }

    /// All baskets, newest first.
    pub fn list_baskets(&self) -> DbResult<Vec<BasketRecord>> {
        let mut rows: Vec<BasketRecord> = scan(&self.baskets, b"")?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Baskets created by `creator`, newest first.
    pub fn list_baskets_by_creator(&self, creator: &CredentialHash) -> DbResult<Vec<BasketRecord>> {
        let mut rows = self.list_baskets()?;
        rows.retain(|r| &r.creator == creator);
        Ok(rows)
    }

    /// Records the confirming transaction of a basket.
    pub fn mark_basket_confirmed(&self, basket_id: &str, tx_hash: TxHash) -> DbResult<()> {
        let mut record = self
            .get_basket(basket_id)?
            .ok_or_else(|| DbError::NotFound(format!("basket {basket_id}")))?;
        record.tx_hash = Some(tx_hash);
        record.status = RecordStatus::Confirmed;
        self.baskets.insert(basket_id.as_bytes(), encode(&record)?)?;
        Ok(())
    }

    // -- Oracle prices ------------------------------------------------------

    pub fn upsert_oracle_price(&self, record: &OraclePriceRecord) -> DbResult<()> {
        self.oracle_prices
            .insert(record.asset_id.as_bytes(), encode(record)?)?;
        Ok(())
    }

    pub fn get_oracle_price(&self, asset_id: &str) -> DbResult<Option<OraclePriceRecord>> {
        get(&self.oracle_prices, asset_id.as_bytes())
    }

    /// All prices, ordered by asset id.
    pub fn list_oracle_prices(&self) -> DbResult<Vec<OraclePriceRecord>> {
        scan(&self.oracle_prices, b"")
    }

    /// Writes the default price table if no price has been stored yet.
    /// Returns the number of rows written.
    pub fn seed_default_oracle_prices(&self, now: u64) -> DbResult<usize> {
        if !self.oracle_prices.is_empty() {
            return Ok(0);
        }
        for (symbol, name, price) in DEFAULT_ORACLE_PRICES {
            self.upsert_oracle_price(&OraclePriceRecord {
                asset_id: (*symbol).to_string(),
                asset_name: (*name).to_string(),
                price_micro_usd: *price,
                updated_at: now,
            })?;
        }
        tracing::info!(count = DEFAULT_ORACLE_PRICES.len(), "seeded default oracle prices");
        Ok(DEFAULT_ORACLE_PRICES.len())
    }

    // -- Vaults -------------------------------------------------------------

    /// Inserts or replaces the row for `(owner, basket_id)`.
    pub fn upsert_vault(&self, record: &VaultRecord) -> DbResult<()> {
        let key = vault_key(&record.owner, &record.basket_id);
        self.vaults.insert(key, encode(record)?)?;
        Ok(())
    }

    pub fn get_vault(
        &self,
        owner: &CredentialHash,
        basket_id: &str,
    ) -> DbResult<Option<VaultRecord>> {
        get(&self.vaults, &vault_key(owner, basket_id))
    }

    /// Vaults of `owner`, newest first.
    pub fn list_vaults_by_owner(&self, owner: &CredentialHash) -> DbResult<Vec<VaultRecord>> {
        let mut rows: Vec<VaultRecord> = scan(&self.vaults, owner.as_bytes())?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Marks a vault row confirmed if it still refers to `tx_hash`.
    ///
    /// Returns `false` when the row has since been superseded by a later
    /// pending transaction, which is left untouched.
    pub fn mark_vault_confirmed(
        &self,
        owner: &CredentialHash,
        basket_id: &str,
        tx_hash: TxHash,
    ) -> DbResult<bool> {
        let mut record = self
            .get_vault(owner, basket_id)?
            .ok_or_else(|| DbError::NotFound(format!("vault {owner}/{basket_id}")))?;
        if record.tx_hash != Some(tx_hash) {
            tracing::debug!(%owner, basket_id, %tx_hash, "vault row superseded, not confirming");
            return Ok(false);
        }
        record.status = RecordStatus::Confirmed;
        self.upsert_vault(&record)?;
        Ok(true)
    }

    // -- Utility ------------------------------------------------------------

    pub fn basket_count(&self) -> usize {
        self.baskets.len()
    }

    pub fn vault_count(&self) -> usize {
        self.vaults.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BasketAsset;

    // -- Helpers ------------------------------------------------------------

    fn basket(id: &str, creator: u8, created_at: u64) -> BasketRecord {
        BasketRecord {
            basket_id: id.to_string(),
            name: format!("{id} basket"),
            description: None,
            assets: vec![BasketAsset::new("BTC", 5_000), BasketAsset::new("ETH", 5_000)],
            creator: CredentialHash::new([creator; 28]),
            tx_hash: None,
            status: RecordStatus::Pending,
            created_at,
        }
    }

    fn vault(owner: u8, basket_id: &str, created_at: u64, tx: u8) -> VaultRecord {
        VaultRecord {
            owner: CredentialHash::new([owner; 28]),
            basket_id: basket_id.to_string(),
            collateral_lovelace: 10_000_000,
            minted_token_units: 0,
            tx_hash: Some(TxHash::new([tx; 32])),
            status: RecordStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    // -- Tests --------------------------------------------------------------

    #[test]
    fn open_temporary_database() {
        let db = EquiBasketDb::open_temporary().expect("should create temp db");
        assert_eq!(db.basket_count(), 0);
        assert_eq!(db.vault_count(), 0);
        assert!(db.list_oracle_prices().unwrap().is_empty());
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = EquiBasketDb::open(dir.path()).expect("should open db");
            db.create_basket(&basket("DEFI", 1, 10)).unwrap();
            db.flush().unwrap();
        }
        let db = EquiBasketDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db.get_basket("DEFI").unwrap(), Some(basket("DEFI", 1, 10)));
    }

    #[test]
    fn duplicate_basket_is_rejected() {
        let db = EquiBasketDb::open_temporary().unwrap();
        db.create_basket(&basket("DEFI", 1, 10)).unwrap();
        let err = db.create_basket(&basket("DEFI", 2, 20)).unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));
        // The first row is untouched.
        assert_eq!(db.get_basket("DEFI").unwrap().unwrap().created_at, 10);
    }

    #[test]
    fn baskets_list_newest_first_and_filter_by_creator() {
        let db = EquiBasketDb::open_temporary().unwrap();
        db.create_basket(&basket("A", 1, 10)).unwrap();
        db.create_basket(&basket("B", 2, 30)).unwrap();
        db.create_basket(&basket("C", 1, 20)).unwrap();

        let ids: Vec<_> = db
            .list_baskets()
            .unwrap()
            .into_iter()
            .map(|b| b.basket_id)
            .collect();
        assert_eq!(ids, vec!["B", "C", "A"]);

        let mine = db
            .list_baskets_by_creator(&CredentialHash::new([1; 28]))
            .unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].basket_id, "C");
    }

    #[test]
    fn basket_confirmation() {
        let db = EquiBasketDb::open_temporary().unwrap();
        db.create_basket(&basket("A", 1, 10)).unwrap();
        db.mark_basket_confirmed("A", TxHash::new([5; 32])).unwrap();
        let row = db.get_basket("A").unwrap().unwrap();
        assert_eq!(row.status, RecordStatus::Confirmed);
        assert_eq!(row.tx_hash, Some(TxHash::new([5; 32])));

        assert!(matches!(
            db.mark_basket_confirmed("missing", TxHash::new([5; 32])),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn seeding_only_happens_once() {
        let db = EquiBasketDb::open_temporary().unwrap();
        assert_eq!(db.seed_default_oracle_prices(1).unwrap(), DEFAULT_ORACLE_PRICES.len());
        assert_eq!(db.seed_default_oracle_prices(2).unwrap(), 0);

        let btc = db.get_oracle_price("BTC").unwrap().unwrap();
        assert_eq!(btc.asset_name, "Bitcoin");
        assert_eq!(btc.price_micro_usd, 60_000_000_000);
        assert_eq!(btc.updated_at, 1);
    }

    #[test]
    fn seeding_skips_non_empty_table() {
        let db = EquiBasketDb::open_temporary().unwrap();
        db.upsert_oracle_price(&OraclePriceRecord {
            asset_id: "XAU".into(),
            asset_name: "Gold".into(),
            price_micro_usd: 2_000_000_000,
            updated_at: 5,
        })
        .unwrap();
        assert_eq!(db.seed_default_oracle_prices(6).unwrap(), 0);
        assert_eq!(db.list_oracle_prices().unwrap().len(), 1);
    }

    #[test]
    fn oracle_price_upsert_replaces() {
        let db = EquiBasketDb::open_temporary().unwrap();
        db.seed_default_oracle_prices(1).unwrap();
        db.upsert_oracle_price(&OraclePriceRecord {
            asset_id: "ADA".into(),
            asset_name: "Cardano".into(),
            price_micro_usd: 750_000,
            updated_at: 2,
        })
        .unwrap();
        assert_eq!(
            db.get_oracle_price("ADA").unwrap().unwrap().price_micro_usd,
            750_000
        );
        assert_eq!(db.list_oracle_prices().unwrap().len(), DEFAULT_ORACLE_PRICES.len());
    }

    #[test]
    fn vaults_are_keyed_by_owner_and_basket() {
        let db = EquiBasketDb::open_temporary().unwrap();
        db.upsert_vault(&vault(1, "A", 10, 1)).unwrap();
        db.upsert_vault(&vault(1, "B", 20, 2)).unwrap();
        db.upsert_vault(&vault(2, "A", 30, 3)).unwrap();

        let owner = CredentialHash::new([1; 28]);
        let rows = db.list_vaults_by_owner(&owner).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].basket_id, "B");
        assert!(db.get_vault(&owner, "C").unwrap().is_none());

        // Upsert replaces rather than duplicates.
        let mut updated = vault(1, "A", 10, 4);
        updated.minted_token_units = 1_000_000;
        db.upsert_vault(&updated).unwrap();
        assert_eq!(db.vault_count(), 3);
        assert_eq!(
            db.get_vault(&owner, "A").unwrap().unwrap().minted_token_units,
            1_000_000
        );
    }

    #[test]
    fn vault_confirmation_respects_supersession() {
        let db = EquiBasketDb::open_temporary().unwrap();
        let owner = CredentialHash::new([1; 28]);
        db.upsert_vault(&vault(1, "A", 10, 1)).unwrap();
        db.upsert_vault(&vault(1, "A", 10, 2)).unwrap();

        // The first transaction's confirmation arrives late.
        assert!(!db
            .mark_vault_confirmed(&owner, "A", TxHash::new([1; 32]))
            .unwrap());
        assert_eq!(
            db.get_vault(&owner, "A").unwrap().unwrap().status,
            RecordStatus::Pending
        );

        assert!(db
            .mark_vault_confirmed(&owner, "A", TxHash::new([2; 32]))
            .unwrap());
        assert_eq!(
            db.get_vault(&owner, "A").unwrap().unwrap().status,
            RecordStatus::Confirmed
        );
    }
}
