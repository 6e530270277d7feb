//! # EquiBasket Protocol: Off-Chain Core
//!
//! EquiBasket lets a user lock ADA in a vault and mint a token that tracks
//! a weighted basket of real-world assets. The validators live on chain;
//! this crate is everything the client side needs to talk to them.
//!
//! ## Architecture
//!
//! - **codec**: Plutus data records and their exact CBOR encoding. Every
//!   byte here is checked by a validator, so the layout is frozen.
//! - **valuation**: fixed-point basket prices, collateral ratios and
//!   vault successor datums.
//! - **chain**: the UTxO query / transaction submit boundary, output
//!   selection and an in-memory ledger.
//! - **storage**: sled-backed rows the UI lists (baskets, prices, vaults).
//! - **client**: one async method per user action, tying the above
//!   together.
//! - **config**: protocol constants and per-network settings.
//!
//! ## Ground Rules
//!
//! 1. Integer math only. Prices are micro-USD, weights and ratios are
//!    basis points.
//! 2. Decoding is strict: wrong tags, arities or trailing bytes fail.
//! 3. Nothing is persisted before a transaction id comes back.

pub mod chain;
pub mod client;
pub mod codec;
pub mod config;
pub mod storage;
pub mod valuation;

pub use client::{ClientError, ClientResult, EquiBasketClient};
pub use codec::{CodecError, PlutusCodec};
pub use valuation::{ValuationError, VaultPosition};
