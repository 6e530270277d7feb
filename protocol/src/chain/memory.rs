//! In-process ledger.
//!
//! Implements both chain capabilities over a plain list of outputs. A
//! submitted request is applied immediately: its script inputs are
//! removed, its outputs appended, and its mint added to a running supply
//! per asset unit. There is no fee, signature or script evaluation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Assets, ChainError, TxRequest, TxSubmitter, Utxo, UtxoQuery};
use crate::codec::{OutputReference, TxHash};

#[derive(Default)]
struct LedgerState {
    utxos: Vec<Utxo>,
    submitted: Vec<TxRequest>,
    supply: BTreeMap<String, i64>,
    tx_counter: u64,
    fail_next_submit: Option<String>,
}

impl LedgerState {
    fn next_tx_id(&mut self) -> TxHash {
        self.tx_counter += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&self.tx_counter.to_be_bytes());
        TxHash::new(bytes)
    }
}

/// Thread-safe in-memory ledger for tests and dry runs.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an output directly, as if produced by an earlier transaction.
    pub fn seed(&self, address: &str, lovelace: u64, datum: Option<Vec<u8>>) -> OutputReference {
        let mut state = self.state.write();
        let tx_id = state.next_tx_id();
        state.utxos.push(Utxo {
            tx_id,
            output_index: 0,
            address: address.to_string(),
            assets: Assets::lovelace(lovelace),
            datum,
        });
        OutputReference::new(tx_id, 0)
    }

    /// Makes the next [`TxSubmitter::submit`] call fail with `reason`.
    pub fn fail_next_submit(&self, reason: &str) {
        self.state.write().fail_next_submit = Some(reason.to_string());
    }

    /// Every request accepted so far, oldest first.
    pub fn submitted(&self) -> Vec<TxRequest> {
        self.state.read().submitted.clone()
    }

    /// Net minted quantity of an asset unit.
    pub fn supply_of(&self, unit: &str) -> i64 {
        self.state.read().supply.get(unit).copied().unwrap_or(0)
    }

    pub fn utxo_count(&self) -> usize {
        self.state.read().utxos.len()
    }
}

#[async_trait]
impl UtxoQuery for InMemoryLedger {
    async fn utxos_at(&self, address: &str) -> Result<Vec<Utxo>, ChainError> {
        Ok(self
            .state
            .read()
            .utxos
            .iter()
            .filter(|u| u.address == address)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TxSubmitter for InMemoryLedger {
    async fn submit(&self, request: TxRequest) -> Result<TxHash, ChainError> {
        let mut state = self.state.write();

        if let Some(reason) = state.fail_next_submit.take() {
            return Err(ChainError::Submission(reason));
        }

        for input in &request.script_inputs {
            if !state.utxos.iter().any(|u| u.out_ref() == input.out_ref) {
                return Err(ChainError::Submission(format!(
                    "input {} is not unspent",
                    input.out_ref
                )));
            }
        }
        for out_ref in &request.reference_inputs {
            if !state.utxos.iter().any(|u| &u.out_ref() == out_ref) {
                return Err(ChainError::Submission(format!(
                    "reference input {out_ref} is not unspent"
                )));
            }
        }

        let tx_id = state.next_tx_id();
        state.utxos.retain(|u| !request.spends(&u.out_ref()));
        for (index, output) in request.outputs.iter().enumerate() {
            state.utxos.push(Utxo {
                tx_id,
                output_index: index as u32,
                address: output.address.clone(),
                assets: Assets::lovelace(output.lovelace),
                datum: output.datum.clone(),
            });
        }
        if let Some(mint) = &request.mint {
            *state.supply.entry(mint.unit()).or_insert(0) += mint.quantity;
        }

        tracing::debug!(%tx_id, kind = %request.kind, "in-memory ledger applied request");
        state.submitted.push(request);
        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{TxKind, TxRequestBuilder};

    #[tokio::test]
    async fn seeded_outputs_are_queryable_by_address() {
        let ledger = InMemoryLedger::new();
        ledger.seed("addr_a", 1, None);
        ledger.seed("addr_b", 2, None);
        ledger.seed("addr_a", 3, None);

        let at_a = ledger.utxos_at("addr_a").await.unwrap();
        assert_eq!(at_a.len(), 2);
        assert_eq!(at_a[1].assets.lovelace, 3);
        assert!(ledger.utxos_at("addr_c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_spends_and_creates() {
        let ledger = InMemoryLedger::new();
        let vault = ledger.seed("addr_vault", 10, Some(vec![0xd8, 0x79, 0x80]));

        let request = TxRequestBuilder::new(TxKind::Mint)
            .spend(vault, vec![])
            .pay_to("addr_vault", 10, Some(vec![0x01]))
            .mint("aa", b"B", 7, vec![])
            .build();
        let tx_id = ledger.submit(request).await.unwrap();

        let utxos = ledger.utxos_at("addr_vault").await.unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].tx_id, tx_id);
        assert_eq!(utxos[0].datum, Some(vec![0x01]));
        assert_eq!(ledger.supply_of("aa42"), 7);
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn double_spend_is_rejected() {
        let ledger = InMemoryLedger::new();
        let vault = ledger.seed("addr_vault", 10, None);
        let spend = || {
            TxRequestBuilder::new(TxKind::Withdraw)
                .spend(vault, vec![])
                .build()
        };
        ledger.submit(spend()).await.unwrap();
        assert!(matches!(
            ledger.submit(spend()).await,
            Err(ChainError::Submission(_))
        ));
    }

    #[tokio::test]
    async fn injected_failure_is_one_shot() {
        let ledger = InMemoryLedger::new();
        ledger.fail_next_submit("wallet declined");
        let request = || TxRequestBuilder::new(TxKind::PublishOracle).build();

        assert_eq!(
            ledger.submit(request()).await,
            Err(ChainError::Submission("wallet declined".into()))
        );
        assert!(ledger.submit(request()).await.is_ok());
    }
}
