//! Wallet error types.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("amount must be positive")] ZeroAmount,
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("transaction id is not valid hex: {0}")] MalformedId(String),
    #[error("wrong password")] InvalidPassword,
    #[error("corrupted keystore: {0}")] CorruptedKeystore(String),
    #[error("encryption: {0}")] Encryption(String),
    #[error("value overflow")] ValueOverflow,
    #[error(transparent)] Io(#[from] std::io::Error),
}
