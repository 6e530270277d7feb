//! Transaction requests.
//!
//! A [`TxRequest`] is everything the validators will look at, already
//! encoded: which script outputs are spent and with which redeemer, which
//! outputs are only read, what the new outputs carry, and what is minted.
//! Fee balancing, change outputs and witnesses are the submitter's job.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{CredentialHash, OutputReference};

/// The user action a request implements. Used for logging and by
/// submitters that attach the matching validator script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    PublishOracle,
    CreateBasket,
    OpenVault,
    Deposit,
    Withdraw,
    Mint,
    Burn,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PublishOracle => "publish_oracle",
            Self::CreateBasket => "create_basket",
            Self::OpenVault => "open_vault",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Mint => "mint",
            Self::Burn => "burn",
        };
        f.write_str(s)
    }
}

/// A script output being spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInput {
    pub out_ref: OutputReference,
    /// CBOR redeemer.
    #[serde(with = "hex_bytes")]
    pub redeemer: Vec<u8>,
}

/// A new output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub lovelace: u64,
    /// Inline datum, CBOR.
    #[serde(with = "hex_bytes_opt")]
    pub datum: Option<Vec<u8>>,
}

/// A mint (positive) or burn (negative) of basket tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintEntry {
    /// Hex policy id of the basket token policy.
    pub policy_id: String,
    /// Token name: the basket id as raw UTF-8 bytes.
    #[serde(with = "hex_bytes")]
    pub asset_name: Vec<u8>,
    pub quantity: i64,
    /// CBOR token policy redeemer.
    #[serde(with = "hex_bytes")]
    pub redeemer: Vec<u8>,
}

impl MintEntry {
    /// Asset unit as used in value maps: `policy_id ++ hex(asset_name)`.
    pub fn unit(&self) -> String {
        format!("{}{}", self.policy_id, hex::encode(&self.asset_name))
    }
}

/// Encoded description of one EquiBasket transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub kind: TxKind,
    pub script_inputs: Vec<ScriptInput>,
    /// Outputs read but not spent (oracle, basket).
    pub reference_inputs: Vec<OutputReference>,
    pub outputs: Vec<TxOutput>,
    pub mint: Option<MintEntry>,
    pub required_signer: Option<CredentialHash>,
    /// Validity upper bound, Unix ms.
    pub valid_to: Option<u64>,
}

impl TxRequest {
    pub fn spends(&self, out_ref: &OutputReference) -> bool {
        self.script_inputs.iter().any(|i| &i.out_ref == out_ref)
    }
}

// ---------------------------------------------------------------------------
// TxRequestBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`TxRequest`].
///
/// ```rust,no_run
/// use equibasket_protocol::chain::{TxKind, TxRequestBuilder};
///
/// let request = TxRequestBuilder::new(TxKind::PublishOracle)
///     .pay_to("addr_test1...", 5_000_000, Some(vec![0xd8, 0x79, 0x80]))
///     .valid_to(1_700_000_900_000)
///     .build();
/// ```
pub struct TxRequestBuilder {
    kind: TxKind,
    script_inputs: Vec<ScriptInput>,
    reference_inputs: Vec<OutputReference>,
    outputs: Vec<TxOutput>,
    mint: Option<MintEntry>,
    required_signer: Option<CredentialHash>,
    valid_to: Option<u64>,
}

impl TxRequestBuilder {
    pub fn new(kind: TxKind) -> Self {
        Self {
            kind,
            script_inputs: Vec::new(),
            reference_inputs: Vec::new(),
            outputs: Vec::new(),
            mint: None,
            required_signer: None,
            valid_to: None,
        }
    }

    /// Spends a script output with the given CBOR redeemer.
    pub fn spend(mut self, out_ref: OutputReference, redeemer: Vec<u8>) -> Self {
        self.script_inputs.push(ScriptInput { out_ref, redeemer });
        self
    }

    /// Adds a reference input.
    pub fn read(mut self, out_ref: OutputReference) -> Self {
        self.reference_inputs.push(out_ref);
        self
    }

    /// Adds an output with an optional inline datum.
    pub fn pay_to(mut self, address: &str, lovelace: u64, datum: Option<Vec<u8>>) -> Self {
        self.outputs.push(TxOutput {
            address: address.to_string(),
            lovelace,
            datum,
        });
        self
    }

    /// Mints (`quantity > 0`) or burns (`quantity < 0`) basket tokens.
    pub fn mint(
        mut self,
        policy_id: &str,
        asset_name: &[u8],
        quantity: i64,
        redeemer: Vec<u8>,
    ) -> Self {
        self.mint = Some(MintEntry {
            policy_id: policy_id.to_string(),
            asset_name: asset_name.to_vec(),
            quantity,
            redeemer,
        });
        self
    }

    pub fn signer(mut self, key_hash: CredentialHash) -> Self {
        self.required_signer = Some(key_hash);
        self
    }

    /// Sets the validity upper bound (Unix ms).
    pub fn valid_to(mut self, unix_ms: u64) -> Self {
        self.valid_to = Some(unix_ms);
        self
    }

    pub fn build(self) -> TxRequest {
        TxRequest {
            kind: self.kind,
            script_inputs: self.script_inputs,
            reference_inputs: self.reference_inputs,
            outputs: self.outputs,
            mint: self.mint,
            required_signer: self.required_signer,
            valid_to: self.valid_to,
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&hex::encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
