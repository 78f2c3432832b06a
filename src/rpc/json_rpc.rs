use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use backoff::backoff::Constant;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    blocks::{decoders::from_optional_u64_hex_str, Block, BlockNumber, TxHash},
    clock::{Clock, SystemClock},
    network::NetworkProfile,
    units::WeiNewtype,
};

use super::{Receipt, RpcClient, RpcError, TxHandle};

pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcMessage {
    Error { error: JsonRpcError },
    Result { result: Value },
}

#[derive(Debug, Error)]
enum CallError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("node returned error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: TxHash,
    #[serde(default, deserialize_with = "from_optional_u64_hex_str")]
    block_number: Option<BlockNumber>,
    // Pre-byzantium receipts carry a state root instead of a status.
    #[serde(default, deserialize_with = "from_optional_u64_hex_str")]
    status: Option<u64>,
}

/// [`RpcClient`] speaking JSON-RPC 2.0 over HTTP to an execution node.
///
/// Transfers go out through `eth_sendTransaction`, signing is left to the node's unlocked `sender`
/// account.
pub struct JsonRpcClient {
    url: String,
    sender_address: Option<String>,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    confirmation_poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            sender_address: None,
            client: reqwest::Client::new(),
            clock: Arc::new(SystemClock),
            confirmation_poll_interval: DEFAULT_CONFIRMATION_POLL_INTERVAL,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn for_profile(profile: &NetworkProfile) -> Self {
        Self::new(&profile.rpc_url)
    }

    pub fn with_sender_address(mut self, sender_address: &str) -> Self {
        self.sender_address = Some(sender_address.to_string());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_confirmation_poll_interval(mut self, interval: Duration) -> Self {
        self.confirmation_poll_interval = interval;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        debug!(method, id, "sending json-rpc request");

        let message = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<RpcMessage>()
            .await?;

        match message {
            RpcMessage::Result { result } => Ok(result),
            RpcMessage::Error { error } => Err(CallError::Rpc(error)),
        }
    }

    async fn get_block_by_tag(&self, tag: String) -> Result<Option<Block>, RpcError> {
        let value = self
            .call("eth_getBlockByNumber", json!((tag, false)))
            .await
            .map_err(|err| RpcError::NetworkUnavailable(err.to_string()))?;

        serde_json::from_value::<Option<Block>>(value)
            .map_err(|err| RpcError::NetworkUnavailable(format!("undecodable block: {err}")))
    }

    async fn poll_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionReceipt, backoff::Error<RpcError>> {
        let value = self
            .call("eth_getTransactionReceipt", json!((tx_hash,)))
            .await
            .map_err(|err| match err {
                CallError::Transport(_) => {
                    warn!(tx_hash, %err, "failed to poll transaction receipt, retrying");
                    backoff::Error::transient(RpcError::NetworkUnavailable(err.to_string()))
                }
                err => backoff::Error::permanent(RpcError::ConfirmationFailed(err.to_string())),
            })?;

        match serde_json::from_value::<Option<TransactionReceipt>>(value) {
            Err(err) => Err(backoff::Error::permanent(RpcError::ConfirmationFailed(
                format!("undecodable receipt: {err}"),
            ))),
            Ok(None) => Err(backoff::Error::transient(RpcError::ConfirmationFailed(
                format!("transaction {tx_hash} still pending"),
            ))),
            Ok(Some(receipt)) => Ok(receipt),
        }
    }
}

#[async_trait]
impl RpcClient for JsonRpcClient {
    async fn get_latest_block(&self) -> Result<Block, RpcError> {
        self.get_block_by_tag("latest".to_string())
            .await?
            .ok_or_else(|| RpcError::NetworkUnavailable("node returned no latest block".into()))
    }

    async fn get_block(&self, number: BlockNumber) -> Result<Block, RpcError> {
        self.get_block_by_tag(format!("0x{number:x}"))
            .await?
            .ok_or(RpcError::NotFound(number))
    }

    async fn send_value_transfer(
        &self,
        to_address: &str,
        amount: WeiNewtype,
    ) -> Result<TxHandle, RpcError> {
        let sender_address = self
            .sender_address
            .as_ref()
            .ok_or_else(|| RpcError::SendFailed("no sender address configured".into()))?;
        let value = amount
            .to_hex_quantity()
            .ok_or_else(|| RpcError::SendFailed(format!("cannot send negative amount {amount}")))?;

        let result = self
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": sender_address,
                    "to": to_address,
                    "value": value
                }]),
            )
            .await
            .map_err(|err| RpcError::SendFailed(err.to_string()))?;

        serde_json::from_value::<TxHash>(result)
            .map(|hash| TxHandle { hash })
            .map_err(|err| RpcError::SendFailed(format!("undecodable transaction hash: {err}")))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, RpcError> {
        let receipt = backoff::future::retry(Constant::new(self.confirmation_poll_interval), || {
            self.poll_receipt(&tx.hash)
        })
        .await?;

        let confirmed_at_ms = self.clock.now_ms();

        if receipt.status == Some(0) {
            return Err(RpcError::ConfirmationFailed(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(Receipt {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            confirmed_at_ms,
        })
    }
}
