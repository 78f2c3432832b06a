//! Keeps a live, bounded view of one network's most recent blocks.
//!
//! A monitor polls its [`RpcClient`] once per expected block interval. Each refresh fetches the
//! latest block and the blocks before it, merges them into the [`BlockWindow`] and tells the render
//! boundary. Pausing or selecting a block freezes what is displayed, the polling carries on
//! underneath.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use thiserror::Error;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    block_window::BlockWindow,
    blocks::{Block, BlockHash},
    events::{self, Event, EventSender},
    network::{Network, NetworkProfile},
    rpc::{RpcClient, RpcError},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorState {
    pub is_paused: bool,
    pub selected_block_hash: Option<BlockHash>,
    pub is_expanded: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum MonitorError {
    #[error("{0} monitor already started")]
    AlreadyStarted(Network),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Window merged and a `WindowChanged` emitted.
    Refreshed,
    /// Another refresh was still in flight.
    Skipped,
    /// The latest block could not be fetched, window untouched.
    Aborted,
    /// The monitor was stopped or restarted while we were fetching, results dropped.
    Stale,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonitorSnapshot {
    pub blocks: Vec<Block>,
    pub displayed_block: Option<Block>,
    pub state: MonitorState,
}

struct MonitorInner {
    window: BlockWindow,
    state: MonitorState,
    // Frozen while paused.
    current_block: Option<Block>,
}

impl MonitorInner {
    fn new(capacity: usize) -> Self {
        Self {
            window: BlockWindow::new(capacity),
            state: MonitorState::default(),
            current_block: None,
        }
    }

    fn displayed_block(&self) -> Option<&Block> {
        self.state
            .selected_block_hash
            .as_ref()
            .and_then(|hash| self.window.get(hash))
            .or(self.current_block.as_ref())
    }

    fn window_changed(&self, network: Network) -> Option<Event> {
        self.displayed_block()
            .cloned()
            .map(|displayed_block| Event::WindowChanged {
                network,
                blocks: self.window.snapshot(),
                displayed_block,
                state: self.state.clone(),
            })
    }
}

const NO_REFRESH: u64 = 0;

/// Holds the refresh slot for one generation. A refresh left over from an older generation doesn't
/// block a newer one, and releasing only clears the slot if nobody newer took it since.
struct InFlightGuard<'a> {
    slot: &'a AtomicU64,
    token: u64,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(slot: &'a AtomicU64, generation: u64) -> Option<Self> {
        let token = generation + 1;
        slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
            (held == NO_REFRESH || held < token).then_some(token)
        })
        .ok()
        .map(|_| Self { slot, token })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let _ = self.slot.compare_exchange(
            self.token,
            NO_REFRESH,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

pub struct NetworkBlockMonitor {
    profile: Arc<NetworkProfile>,
    client: Arc<dyn RpcClient>,
    events: EventSender,
    inner: Mutex<MonitorInner>,
    // Generation of the refresh in flight plus one, zero when idle.
    refresh_in_flight: AtomicU64,
    // Bumped on every start and stop, refreshes from an older generation are stale.
    generation: AtomicU64,
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkBlockMonitor {
    pub fn new(
        profile: Arc<NetworkProfile>,
        client: Arc<dyn RpcClient>,
        events: EventSender,
    ) -> Self {
        let inner = MonitorInner::new(profile.window_capacity);
        Self {
            profile,
            client,
            events,
            inner: Mutex::new(inner),
            refresh_in_flight: AtomicU64::new(NO_REFRESH),
            generation: AtomicU64::new(0),
            schedule: Mutex::new(None),
        }
    }

    pub fn network(&self) -> Network {
        self.profile.network
    }

    pub fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    /// Fetches right away, then once every expected block interval until stopped.
    pub fn start(self: &Arc<Self>) -> Result<(), MonitorError> {
        let mut schedule = self.schedule.lock().unwrap();
        if schedule.is_some() {
            return Err(MonitorError::AlreadyStarted(self.network()));
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.inner.lock().unwrap() = MonitorInner::new(self.profile.window_capacity);

        info!(
            network = %self.network(),
            interval_ms = self.profile.expected_block_interval.as_millis() as u64,
            "starting block monitor"
        );

        // A weak reference so a forgotten monitor doesn't live on through its own timer.
        let monitor = Arc::downgrade(self);
        let period = self.profile.expected_block_interval;

        *schedule = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let Some(monitor) = monitor.upgrade() else {
                    break;
                };

                // Each tick refreshes on its own task, a slow fetch must not delay the timer.
                tokio::spawn(async move {
                    monitor.refresh_once().await;
                });
            }
        }));

        Ok(())
    }

    /// Cancels the schedule and drops the window. Refreshes already in flight run to completion but
    /// their results are ignored.
    pub fn stop(&self) {
        let handle = self.schedule.lock().unwrap().take();

        if let Some(handle) = handle {
            handle.abort();
            self.generation.fetch_add(1, Ordering::AcqRel);
            *self.inner.lock().unwrap() = MonitorInner::new(self.profile.window_capacity);
            info!(network = %self.network(), "stopped block monitor");
        }
    }

    pub fn is_running(&self) -> bool {
        self.schedule.lock().unwrap().is_some()
    }

    async fn fetch_recent_blocks(&self) -> Result<Vec<Block>, RpcError> {
        let latest = self.client.get_latest_block().await?;

        let history_len = self.profile.window_capacity.saturating_sub(1);
        let mut blocks = Vec::with_capacity(history_len + 1);
        let latest_number = latest.number;
        blocks.push(latest);

        for number in (0..latest_number).rev().take(history_len) {
            match self.client.get_block(number).await {
                Ok(block) => blocks.push(block),
                Err(err @ RpcError::NotFound(_)) => {
                    warn!(block_number = number, %err, "skipping missing block");
                }
                Err(err) => {
                    warn!(
                        block_number = number,
                        %err,
                        "failed to fetch block, keeping the blocks fetched so far"
                    );
                    break;
                }
            }
        }

        Ok(blocks)
    }

    #[instrument(skip_all, fields(network = %self.profile.network))]
    pub async fn refresh_once(&self) -> RefreshOutcome {
        let generation = self.generation.load(Ordering::Acquire);

        let Some(_in_flight) = InFlightGuard::acquire(&self.refresh_in_flight, generation) else {
            debug!("refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        };

        let blocks = match self.fetch_recent_blocks().await {
            Ok(blocks) => blocks,
            Err(err) => {
                error!(%err, "failed to fetch latest block, keeping current window");
                return RefreshOutcome::Aborted;
            }
        };

        let mut inner = self.inner.lock().unwrap();

        if self.generation.load(Ordering::Acquire) != generation {
            debug!("monitor stopped or restarted during refresh, discarding fetched blocks");
            return RefreshOutcome::Stale;
        }

        inner.window.merge(blocks);

        let selection_aged_out = inner
            .state
            .selected_block_hash
            .as_ref()
            .is_some_and(|hash| !inner.window.contains(hash));
        if selection_aged_out {
            debug!("selected block left the window, clearing selection");
            inner.state.selected_block_hash = None;
        }

        let current_aged_out = inner
            .current_block
            .as_ref()
            .map_or(true, |block| !inner.window.contains(&block.hash));
        if !inner.state.is_paused || current_aged_out {
            inner.current_block = inner.window.newest().cloned();
        }

        debug!(
            newest = inner.window.newest().map(|block| block.number),
            len = inner.window.len(),
            "refreshed block window"
        );

        if let Some(event) = inner.window_changed(self.network()) {
            events::emit(&self.events, event);
        }

        RefreshOutcome::Refreshed
    }

    /// Flips pause, returns whether we're now paused. Resuming ends any inspection: the selection is
    /// cleared and the newest block is displayed again.
    pub fn toggle_pause(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.state.is_paused = !inner.state.is_paused;

        if !inner.state.is_paused {
            inner.state.selected_block_hash = None;
            inner.current_block = inner.window.newest().cloned();

            if let Some(event) = inner.window_changed(self.network()) {
                events::emit(&self.events, event);
            }
        }

        debug!(network = %self.network(), is_paused = inner.state.is_paused, "toggled pause");

        inner.state.is_paused
    }

    /// Selects a block in the window for inspection and pauses. Unknown hashes are ignored,
    /// returns whether the selection took.
    pub fn select_block(&self, hash: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if !inner.window.contains(hash) {
            warn!(network = %self.network(), hash, "cannot select block outside the window");
            return false;
        }

        inner.state.selected_block_hash = Some(hash.to_string());
        inner.state.is_paused = true;

        if let Some(event) = inner.window_changed(self.network()) {
            events::emit(&self.events, event);
        }

        true
    }

    /// Flips the expanded view, returns whether it's now expanded. Expanding re-emits the window so
    /// the extended fields get rendered.
    pub fn toggle_expanded(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.state.is_expanded = !inner.state.is_expanded;

        if inner.state.is_expanded {
            if let Some(event) = inner.window_changed(self.network()) {
                events::emit(&self.events, event);
            }
        }

        inner.state.is_expanded
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let inner = self.inner.lock().unwrap();
        MonitorSnapshot {
            blocks: inner.window.snapshot(),
            displayed_block: inner.displayed_block().cloned(),
            state: inner.state.clone(),
        }
    }
}

impl Drop for NetworkBlockMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.schedule.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}
