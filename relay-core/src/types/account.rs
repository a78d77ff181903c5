use derive_new::new;
use serde::{Deserialize, Serialize};

/// Submission-side nonce state of one signing account.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct AccountInfo {
    /// Chain-assigned account number, stable for the account's lifetime
    pub account_number: u64,
    /// Next sequence (nonce) to put in a transaction
    pub sequence: u64,
}

impl AccountInfo {
    /// The same account with its sequence advanced by one
    pub fn next(self) -> Self {
        Self {
            account_number: self.account_number,
            sequence: self.sequence + 1,
        }
    }
}
