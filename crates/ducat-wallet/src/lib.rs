//! # ducat-wallet — key custody and transaction construction.
//!
//! Holds the Ed25519 identity, persists it under password encryption,
//! and builds signed value transfers from the owner's unspent outputs.
//! The wallet talks to a node only through the public query and submit
//! endpoints; no key material ever leaves this crate.

pub mod builder;
pub mod error;
pub mod keys;
pub mod keystore;

pub use builder::build_transfer;
pub use error::WalletError;
pub use keys::WalletKey;
pub use keystore::{load_key, save_key};
