pub use congestion::*;
pub use mempool::*;
pub use sequence_tracker::*;
pub use submitter::*;

mod congestion;
mod mempool;
mod sequence_tracker;
mod submitter;
