pub use account::*;
pub use channel::*;
pub use message::*;
pub use transaction::*;

mod account;
mod channel;
mod message;
mod transaction;
