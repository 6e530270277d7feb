//! Choosing which script output to act on.
//!
//! Script addresses accumulate outputs: every oracle publish and every
//! vault action leaves a new one. Oracles and vaults follow "latest wins":
//! among the outputs whose datum decodes (and matches owner and basket,
//! for vaults), take the last one in ledger order. Baskets are defined
//! once, so the first definition of an id is the only one honored; a
//! later output reusing the id never changes how the basket is priced.
//! Outputs with a missing or undecodable datum are skipped, never fatal.

use crate::codec::{BasketDatum, CredentialHash, OracleDatum, PlutusCodec, VaultDatum};

use super::Utxo;

/// An output together with its decoded datum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected<T> {
    pub utxo: Utxo,
    pub datum: T,
}

fn decoded<T: PlutusCodec>(utxos: &[Utxo]) -> Vec<Selected<T>> {
    utxos
        .iter()
        .filter_map(|utxo| match utxo.decode_datum::<T>() {
            Some(Ok(datum)) => Some(Selected {
                utxo: utxo.clone(),
                datum,
            }),
            Some(Err(e)) => {
                tracing::warn!(
                    out_ref = %utxo.out_ref(),
                    record = T::NAME,
                    error = %e,
                    "skipping output with undecodable datum"
                );
                None
            }
            None => None,
        })
        .collect()
}

/// Latest output carrying a valid [`OracleDatum`].
pub fn select_oracle(utxos: &[Utxo]) -> Option<Selected<OracleDatum>> {
    let candidates = decoded::<OracleDatum>(utxos);
    if candidates.len() > 1 {
        tracing::warn!(
            count = candidates.len(),
            "multiple oracle outputs, using the most recent"
        );
    }
    candidates.into_iter().last()
}

/// Original definition of `basket_id`: the earliest output carrying it.
pub fn select_basket(utxos: &[Utxo], basket_id: &str) -> Option<Selected<BasketDatum>> {
    let mut matching = decoded::<BasketDatum>(utxos)
        .into_iter()
        .filter(|s| s.datum.basket_id == basket_id);
    let original = matching.next()?;
    let shadowing = matching.count();
    if shadowing > 0 {
        tracing::warn!(
            basket_id,
            creator = %original.datum.creator,
            ignored = shadowing,
            "later basket outputs reuse this id, keeping the original"
        );
    }
    Some(original)
}

/// Latest vault owned by `owner` for `basket_id`.
pub fn select_vault(
    utxos: &[Utxo],
    owner: &CredentialHash,
    basket_id: &str,
) -> Option<Selected<VaultDatum>> {
    decoded::<VaultDatum>(utxos)
        .into_iter()
        .filter(|s| &s.datum.owner == owner && s.datum.basket_id == basket_id)
        .last()
}
