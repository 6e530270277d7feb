//! # Storage Module
//!
//! Off-chain rows for the UI: baskets, oracle prices and vaults.
//!
//! ```text
//! records.rs : row types and their status
//! db.rs      : sled persistence with one tree per row type
//! ```
//!
//! Values are bincode. JSON is for the CLI and debugging; bincode is for
//! storage.

pub mod db;
pub mod records;

pub use db::{DbError, DbResult, EquiBasketDb};
pub use records::{BasketRecord, OraclePriceRecord, RecordStatus, VaultRecord};
