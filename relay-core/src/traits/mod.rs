pub use chain_reader::*;
pub use chain_writer::*;
pub use checkpoint::*;
pub use congestion::*;

mod chain_reader;
mod chain_writer;
mod checkpoint;
mod congestion;
