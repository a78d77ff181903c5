use derive_new::new;
use serde::{Deserialize, Serialize};

/// A chain-specific transaction body that has not been signed yet. The relay
/// engine treats the encoding as opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction(pub Vec<u8>);

/// A signed, broadcastable transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction(pub Vec<u8>);

/// The result of broadcasting a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct TxOutcome {
    /// Chain-specific transaction identifier
    pub transaction_id: String,
    /// Height the transaction was included at, if the chain reported it
    pub height: Option<u64>,
}
