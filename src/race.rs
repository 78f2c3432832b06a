//! Sends one value transfer per network and compares how long each took to confirm.
//!
//! Every `start` opens a new attempt. Legs report back tagged with the attempt they belong to and
//! anything arriving for an attempt that is no longer current is dropped, network calls are never
//! cancelled.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use futures::{stream::FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::{
    clock::{Clock, EpochMs},
    events::{self, Event, EventSender},
    network::Network,
    rpc::{Receipt, RpcClient, TxHandle},
    units::WeiNewtype,
};

pub type AttemptId = u64;

#[derive(Debug, Error, PartialEq)]
pub enum RaceError {
    #[error("amount must be positive, got {0} wei")]
    InvalidAmount(WeiNewtype),
    #[error("race attempt {0} has not settled yet")]
    AlreadyRunning(AttemptId),
    #[error("no networks to race on")]
    NoNetworks,
    #[error("no rpc client configured for {0}")]
    UnknownNetwork(Network),
}

/// One network's leg of an attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct RaceResult {
    pub sent_at_ms: EpochMs,
    pub confirmed_at_ms: Option<EpochMs>,
    pub duration_ms: Option<u64>,
    pub tx_handle: Option<TxHandle>,
    pub failure: Option<String>,
}

impl RaceResult {
    fn sent(sent_at_ms: EpochMs) -> Self {
        Self {
            sent_at_ms,
            confirmed_at_ms: None,
            duration_ms: None,
            tx_handle: None,
            failure: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.confirmed_at_ms.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Comparison {
    /// `None` when both legs took exactly as long.
    pub faster_network: Option<Network>,
    pub speed_factor: f64,
}

/// Slower over faster. Durations are clamped to 1ms so an instant confirmation can't divide by
/// zero.
pub fn compare(first: (Network, u64), second: (Network, u64)) -> Comparison {
    let (first_network, first_ms) = first;
    let (second_network, second_ms) = second;

    let (faster_network, faster_ms, slower_ms) = match first_ms.cmp(&second_ms) {
        std::cmp::Ordering::Equal => {
            return Comparison {
                faster_network: None,
                speed_factor: 1.0,
            }
        }
        std::cmp::Ordering::Less => (first_network, first_ms, second_ms),
        std::cmp::Ordering::Greater => (second_network, second_ms, first_ms),
    };

    Comparison {
        faster_network: Some(faster_network),
        speed_factor: slower_ms.max(1) as f64 / faster_ms.max(1) as f64,
    }
}

fn leg_duration_ms(sent_at_ms: EpochMs, confirmed_at_ms: EpochMs) -> u64 {
    confirmed_at_ms.saturating_sub(sent_at_ms).max(0) as u64
}

#[derive(Default)]
struct RaceInner {
    running: bool,
    requested: Vec<Network>,
    results: BTreeMap<Network, RaceResult>,
}

type Leg = (Network, Arc<dyn RpcClient>);

pub struct LatencyRace {
    clients: BTreeMap<Network, Arc<dyn RpcClient>>,
    recipient: String,
    clock: Arc<dyn Clock>,
    events: EventSender,
    // Only written while holding `inner`.
    attempt: AtomicU64,
    inner: Mutex<RaceInner>,
}

impl LatencyRace {
    pub fn new(
        clients: BTreeMap<Network, Arc<dyn RpcClient>>,
        recipient: &str,
        clock: Arc<dyn Clock>,
        events: EventSender,
    ) -> Self {
        Self {
            clients,
            recipient: recipient.to_string(),
            clock,
            events,
            attempt: AtomicU64::new(0),
            inner: Mutex::new(RaceInner::default()),
        }
    }

    /// Validates, opens a new attempt and races it on a spawned task. Returns as soon as the legs
    /// are under way.
    pub fn start(
        self: &Arc<Self>,
        amount: WeiNewtype,
        networks: &[Network],
    ) -> Result<AttemptId, RaceError> {
        if !amount.is_positive() {
            return Err(RaceError::InvalidAmount(amount));
        }

        let mut requested: Vec<Network> = Vec::with_capacity(networks.len());
        for network in networks {
            if !requested.contains(network) {
                requested.push(*network);
            }
        }

        if requested.is_empty() {
            return Err(RaceError::NoNetworks);
        }

        let legs = requested
            .iter()
            .map(|network| {
                self.clients
                    .get(network)
                    .map(|client| (*network, client.clone()))
                    .ok_or(RaceError::UnknownNetwork(*network))
            })
            .collect::<Result<Vec<Leg>, _>>()?;

        let attempt = {
            let mut inner = self.inner.lock().unwrap();
            if inner.running {
                return Err(RaceError::AlreadyRunning(self.current_attempt()));
            }

            inner.running = true;
            inner.requested = requested;
            inner.results.clear();
            self.attempt.fetch_add(1, Ordering::AcqRel) + 1
        };

        info!(attempt, amount = %amount.to_eth_string(), "starting latency race");

        let race = self.clone();
        tokio::spawn(async move { race.run(attempt, amount, legs).await });

        Ok(attempt)
    }

    /// Gives up on the current attempt. Its legs keep running against the network but whatever they
    /// report is discarded, and a new `start` is accepted right away.
    pub fn abandon(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.running {
            return;
        }

        let abandoned = self.attempt.fetch_add(1, Ordering::AcqRel);
        inner.running = false;
        inner.requested.clear();
        inner.results.clear();

        info!(attempt = abandoned, "abandoned latency race");
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn current_attempt(&self) -> AttemptId {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn results(&self) -> BTreeMap<Network, RaceResult> {
        self.inner.lock().unwrap().results.clone()
    }

    fn is_superseded(&self, attempt: AttemptId) -> bool {
        self.current_attempt() != attempt
    }

    #[instrument(skip_all, fields(attempt = attempt))]
    async fn run(self: Arc<Self>, attempt: AttemptId, amount: WeiNewtype, legs: Vec<Leg>) {
        let race = &*self;
        let leg_count = legs.len();
        let (issued_tx, issued_rx) = watch::channel(0usize);
        let issued_tx = &issued_tx;

        // Each leg moves on to its confirmation as soon as its own send returns, but never before
        // every leg's send has been issued.
        let mut legs = legs
            .into_iter()
            .map(|(network, client)| {
                let mut issued_rx = issued_rx.clone();
                async move {
                    let sent_at_ms = race.clock.now_ms();
                    let send = client.send_value_transfer(&race.recipient, amount);
                    issued_tx.send_modify(|issued| *issued += 1);

                    let tx = match send.await {
                        Ok(tx) => tx,
                        Err(err) => {
                            race.leg_failed(attempt, network, sent_at_ms, err.to_string());
                            return;
                        }
                    };
                    race.leg_sent(attempt, network, sent_at_ms, &tx);

                    // The sender lives as long as `run`, waiting can't fail.
                    let _ = issued_rx.wait_for(|issued| *issued >= leg_count).await;

                    match client.await_confirmation(&tx).await {
                        Ok(receipt) => race.leg_completed(attempt, network, sent_at_ms, receipt),
                        Err(err) => race.leg_failed(attempt, network, sent_at_ms, err.to_string()),
                    }
                }
            })
            .collect::<FuturesUnordered<_>>();

        while legs.next().await.is_some() {}

        self.settle(attempt);
    }

    fn leg_sent(&self, attempt: AttemptId, network: Network, sent_at_ms: EpochMs, tx: &TxHandle) {
        let mut inner = self.inner.lock().unwrap();
        if self.is_superseded(attempt) {
            return;
        }

        debug!(%network, hash = %tx.hash, "leg sent");

        let result = inner
            .results
            .entry(network)
            .or_insert_with(|| RaceResult::sent(sent_at_ms));
        result.tx_handle = Some(tx.clone());
    }

    fn leg_completed(
        &self,
        attempt: AttemptId,
        network: Network,
        sent_at_ms: EpochMs,
        receipt: Receipt,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if self.is_superseded(attempt) {
            debug!(%network, hash = %receipt.hash, "discarding confirmation of superseded attempt");
            return;
        }

        let duration_ms = leg_duration_ms(sent_at_ms, receipt.confirmed_at_ms);
        let result = inner
            .results
            .entry(network)
            .or_insert_with(|| RaceResult::sent(sent_at_ms));
        result.confirmed_at_ms = Some(receipt.confirmed_at_ms);
        result.duration_ms = Some(duration_ms);

        info!(%network, hash = %receipt.hash, duration_ms, "leg confirmed");

        events::emit(
            &self.events,
            Event::LegCompleted {
                attempt,
                network,
                hash: receipt.hash,
                duration_ms,
            },
        );
    }

    fn leg_failed(
        &self,
        attempt: AttemptId,
        network: Network,
        sent_at_ms: EpochMs,
        reason: String,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if self.is_superseded(attempt) {
            debug!(%network, %reason, "discarding failure of superseded attempt");
            return;
        }

        warn!(%network, %reason, "leg failed");

        let result = inner
            .results
            .entry(network)
            .or_insert_with(|| RaceResult::sent(sent_at_ms));
        result.failure = Some(reason.clone());

        events::emit(
            &self.events,
            Event::LegFailed {
                attempt,
                network,
                reason,
            },
        );
    }

    fn settle(&self, attempt: AttemptId) {
        let mut inner = self.inner.lock().unwrap();
        if self.is_superseded(attempt) {
            debug!("superseded attempt settled");
            return;
        }

        inner.running = false;

        let durations = inner
            .requested
            .iter()
            .map(|network| {
                inner
                    .results
                    .get(network)
                    .and_then(|result| result.duration_ms)
                    .map(|duration_ms| (*network, duration_ms))
            })
            .collect::<Option<Vec<_>>>();

        match durations.as_deref() {
            Some(&[first, second]) => {
                let comparison = compare(first, second);
                info!(
                    faster = ?comparison.faster_network,
                    speed_factor = comparison.speed_factor,
                    "race compared"
                );
                events::emit(
                    &self.events,
                    Event::RaceCompared {
                        attempt,
                        faster_network: comparison.faster_network,
                        speed_factor: comparison.speed_factor,
                    },
                );
            }
            _ => debug!("race settled without a comparison"),
        }
    }
}
