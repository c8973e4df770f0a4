//! Error types for the Ducat protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key PEM")] InvalidPublicKey,
    #[error("invalid signature encoding")] InvalidSignature,
    #[error("transaction id is not valid hex")] InvalidIdEncoding,
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("id mismatch: declared {declared}, computed {computed}")] IdMismatch { declared: String, computed: String },
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("unknown UTXO: {0}")] UnknownUtxo(String),
    #[error("input {index} public key does not match UTXO owner")] OwnerMismatch { index: usize },
    #[error("invalid signature on input {index}")] InvalidSignature { index: usize },
    #[error("value mismatch: inputs {inputs}, outputs {outputs}")] ValueMismatch { inputs: u64, outputs: u64 },
    #[error("value overflow")] ValueOverflow,
    #[error("invalid coinbase: {0}")] InvalidCoinbase(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u64, got: u64 },
    #[error("prev hash does not match parent")] PrevHashMismatch,
    #[error("declared hash does not match header")] HashMismatch,
    #[error("difficulty mismatch: expected {expected}, got {got}")] DifficultyMismatch { expected: u32, got: u32 },
    #[error("hash does not meet difficulty {0}")] PowNotMet(u32),
    #[error("timestamp precedes parent")] TimestampBeforeParent,
    #[error("timestamp too far ahead: {ahead_ms} ms")] TimestampTooFar { ahead_ms: u64 },
    #[error("genesis block cannot be replaced")] UnexpectedGenesis,
    #[error("genesis block must carry no transactions")] GenesisNotEmpty,
    #[error("missing coinbase")] MissingCoinbase,
    #[error("double spend across block: {0}")] DoubleSpend(String),
    #[error("tx {index}: {source}")] Transaction { index: usize, source: TransactionError },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain is empty")] EmptyChain,
    #[error("chain does not start at the hardcoded genesis")] ForeignGenesis,
    #[error("block {index}: {source}")] InvalidBlock { index: usize, source: BlockError },
    #[error("remote chain is not heavier: local {local}, remote {remote}")] NotHeavier { local: u128, remote: u128 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already in pool: {0}")] AlreadyPooled(String),
    #[error("input {outpoint} already consumed by pool tx {pooled}")] InputConflict { outpoint: String, pooled: String },
    #[error(transparent)] Invalid(#[from] TransactionError),
}
