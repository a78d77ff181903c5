use std::fmt::{Display, Formatter};

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::ChainResult;

/// A cross-chain message envelope extracted from a source chain block.
///
/// `sequence_number` is assigned by the source chain's connection and only
/// has meaning for the `(source_network, destination_network)` pair. It is
/// unrelated to the nonce of the account that later relays the message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, new)]
pub struct Message {
    /// Origin chain identifier
    pub source_network: String,
    /// Destination chain identifier
    pub destination_network: String,
    /// Ordering number assigned by the source connection
    pub sequence_number: u64,
    /// Opaque payload, never interpreted by the relay
    pub payload: Vec<u8>,
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Message {{ {} -> {}, sequence: {}, payload: 0x{} }}",
            self.source_network,
            self.destination_network,
            self.sequence_number,
            hex::encode(&self.payload)
        )
    }
}

/// Messages found at a single height, ready to be handed downstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, new)]
pub struct BlockInfo {
    /// The scanned height
    pub height: u64,
    /// Messages in the order the chain returned them
    pub messages: Vec<Message>,
}

/// The outcome of scanning one block height.
///
/// Produced once per height by a scan worker and consumed once by the
/// listener.
#[derive(Debug, new)]
pub struct BlockScanResult {
    /// The scanned height
    pub height: u64,
    /// Extracted messages, or the error that prevented extracting them
    pub messages: ChainResult<Vec<Message>>,
}

impl BlockScanResult {
    /// Whether the scan of this height failed
    pub fn is_err(&self) -> bool {
        self.messages.is_err()
    }

    /// The scan error, if any
    pub fn error(&self) -> Option<&crate::ChainCommunicationError> {
        self.messages.as_ref().err()
    }

    /// Convert a successful scan into the unit forwarded downstream
    pub fn into_block_info(self) -> ChainResult<BlockInfo> {
        let height = self.height;
        self.messages.map(|messages| BlockInfo { height, messages })
    }
}
