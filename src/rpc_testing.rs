//! Scriptable in-memory chain for tests that need control over when calls resolve.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use crate::{
    blocks::{tests::BlockBuilder, Block, BlockNumber, TxHash},
    clock::{EpochMs, MockClock},
    network::Network,
    rpc::{Receipt, RpcClient, RpcError, TxHandle},
    units::WeiNewtype,
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn fixed_clock(now_ms: EpochMs) -> MockClock {
    let mut clock = MockClock::new();
    clock.expect_now_ms().return_const(now_ms);
    clock
}

/// How one race leg plays out on a [`FakeRpcClient`].
#[derive(Clone)]
pub struct LegScript {
    pub send_error: Option<RpcError>,
    /// The send never returns.
    pub send_hangs: bool,
    pub confirmation: Result<EpochMs, RpcError>,
    /// When set, the confirmation only resolves once a permit is added.
    pub gate: Option<Arc<Semaphore>>,
}

impl LegScript {
    pub fn confirmed_at(confirmed_at_ms: EpochMs) -> Self {
        Self {
            send_error: None,
            send_hangs: false,
            confirmation: Ok(confirmed_at_ms),
            gate: None,
        }
    }

    pub fn send_fails() -> Self {
        Self {
            send_error: Some(RpcError::SendFailed("nonce too low".to_string())),
            send_hangs: false,
            confirmation: Err(RpcError::ConfirmationFailed("never sent".to_string())),
            gate: None,
        }
    }

    pub fn confirmation_fails() -> Self {
        Self {
            send_error: None,
            send_hangs: false,
            confirmation: Err(RpcError::ConfirmationFailed("reverted".to_string())),
            gate: None,
        }
    }

    pub fn send_hangs() -> Self {
        Self {
            send_hangs: true,
            ..Self::confirmed_at(0)
        }
    }

    pub fn gated(mut self, gate: &Arc<Semaphore>) -> Self {
        self.gate = Some(gate.clone());
        self
    }
}

pub struct FakeRpcClient {
    network: Network,
    head: Mutex<Option<BlockNumber>>,
    missing: Mutex<HashSet<BlockNumber>>,
    unavailable: Mutex<HashSet<BlockNumber>>,
    latest_gate: Mutex<Option<Arc<Semaphore>>>,
    pub latest_entered: Notify,
    legs: Mutex<VecDeque<LegScript>>,
    sent: Mutex<HashMap<TxHash, LegScript>>,
    call_log: CallLog,
    pub latest_calls: AtomicUsize,
    pub block_calls: AtomicUsize,
}

impl FakeRpcClient {
    pub fn new(network: Network) -> Self {
        Self::with_call_log(network, CallLog::default())
    }

    pub fn with_call_log(network: Network, call_log: CallLog) -> Self {
        Self {
            network,
            head: Mutex::new(None),
            missing: Mutex::new(HashSet::new()),
            unavailable: Mutex::new(HashSet::new()),
            latest_gate: Mutex::new(None),
            latest_entered: Notify::new(),
            legs: Mutex::new(VecDeque::new()),
            sent: Mutex::new(HashMap::new()),
            call_log,
            latest_calls: AtomicUsize::new(0),
            block_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_head(self, head: BlockNumber) -> Self {
        self.set_head(Some(head));
        self
    }

    /// `None` makes the latest block unavailable.
    pub fn set_head(&self, head: Option<BlockNumber>) {
        *self.head.lock().unwrap() = head;
    }

    pub fn advance_head(&self) -> BlockNumber {
        let mut head = self.head.lock().unwrap();
        let next = head.map_or(0, |number| number + 1);
        *head = Some(next);
        next
    }

    pub fn set_missing(&self, number: BlockNumber) {
        self.missing.lock().unwrap().insert(number);
    }

    pub fn set_unavailable(&self, number: BlockNumber) {
        self.unavailable.lock().unwrap().insert(number);
    }

    /// Latest block fetches wait for a permit on the returned semaphore.
    pub fn gate_latest(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.latest_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn push_leg(&self, leg: LegScript) {
        self.legs.lock().unwrap().push_back(leg);
    }

    pub fn call_log(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    fn log(&self, call: &str) {
        self.call_log
            .lock()
            .unwrap()
            .push(format!("{call} {}", self.network));
    }

    pub fn block(number: BlockNumber) -> Block {
        BlockBuilder::numbered(number)
            .with_transactions((number % 7) as usize)
            .build()
    }
}

async fn pass_gate(gate: Option<Arc<Semaphore>>) {
    if let Some(gate) = gate {
        gate.acquire()
            .await
            .expect("test gates are never closed")
            .forget();
    }
}

#[async_trait]
impl RpcClient for FakeRpcClient {
    async fn get_latest_block(&self) -> Result<Block, RpcError> {
        self.log("latest");
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.latest_entered.notify_one();

        let gate = self.latest_gate.lock().unwrap().clone();
        pass_gate(gate).await;

        let head = *self.head.lock().unwrap();
        head.map(Self::block)
            .ok_or_else(|| RpcError::NetworkUnavailable("connection refused".to_string()))
    }

    async fn get_block(&self, number: BlockNumber) -> Result<Block, RpcError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);

        if self.missing.lock().unwrap().contains(&number) {
            return Err(RpcError::NotFound(number));
        }

        if self.unavailable.lock().unwrap().contains(&number) {
            return Err(RpcError::NetworkUnavailable("connection reset".to_string()));
        }

        Ok(Self::block(number))
    }

    async fn send_value_transfer(
        &self,
        _to_address: &str,
        _amount: WeiNewtype,
    ) -> Result<TxHandle, RpcError> {
        self.log("send");

        let leg = self
            .legs
            .lock()
            .unwrap()
            .pop_front()
            .expect("a scripted leg for every send");

        if leg.send_hangs {
            std::future::pending::<()>().await;
        }

        if let Some(err) = leg.send_error.clone() {
            return Err(err);
        }

        let mut sent = self.sent.lock().unwrap();
        let hash = format!("0x{}{}", self.network, sent.len());
        sent.insert(hash.clone(), leg);

        Ok(TxHandle { hash })
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, RpcError> {
        self.log("confirm");

        let leg = self
            .sent
            .lock()
            .unwrap()
            .get(&tx.hash)
            .cloned()
            .expect("confirmations only for sent transactions");

        pass_gate(leg.gate).await;

        leg.confirmation.map(|confirmed_at_ms| Receipt {
            hash: tx.hash.clone(),
            block_number: Some(1),
            confirmed_at_ms,
        })
    }
}
