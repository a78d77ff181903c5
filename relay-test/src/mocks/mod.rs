pub use chain_reader::MockChainReader;
pub use chain_writer::{MockChainWriter, MOCK_SIGNER_ADDRESS};

mod chain_reader;
mod chain_writer;
