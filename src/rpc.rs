//! The capability the monitors and the race need from a network. Everything network specific sits
//! behind [`RpcClient`].

mod json_rpc;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::{
    blocks::{Block, BlockNumber, TxHash},
    clock::EpochMs,
    units::WeiNewtype,
};

pub use json_rpc::{JsonRpcClient, DEFAULT_CONFIRMATION_POLL_INTERVAL};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RpcError {
    /// Transient, the next poll tries again.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("block {0} not found")]
    NotFound(BlockNumber),
    #[error("failed to send transaction: {0}")]
    SendFailed(String),
    #[error("failed to confirm transaction: {0}")]
    ConfirmationFailed(String),
}

/// A submitted transaction we can wait on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: TxHash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub hash: TxHash,
    pub block_number: Option<BlockNumber>,
    pub confirmed_at_ms: EpochMs,
}

#[automock]
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn get_latest_block(&self) -> Result<Block, RpcError>;
    async fn get_block(&self, number: BlockNumber) -> Result<Block, RpcError>;
    async fn send_value_transfer(
        &self,
        to_address: &str,
        amount: WeiNewtype,
    ) -> Result<TxHandle, RpcError>;
    /// Resolves once the transaction is included. Unbounded, callers wanting a timeout add their
    /// own.
    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, RpcError>;
}
