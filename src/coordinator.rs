//! Owns one monitor per network and the latency race, and starts and stops them together.

use std::{collections::BTreeMap, sync::Arc};

use thiserror::Error;
use tracing::info;

use crate::{
    clock::Clock,
    events::EventSender,
    monitor::{MonitorError, NetworkBlockMonitor},
    network::{Network, NetworkProfile},
    race::{AttemptId, LatencyRace, RaceError},
    rpc::RpcClient,
    units::WeiNewtype,
};

#[derive(Debug, Error, PartialEq)]
pub enum CoordinatorError {
    #[error("both setups are for {0}, need one per network")]
    DuplicateNetwork(Network),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Race(#[from] RaceError),
}

/// What one network needs to be monitored and raced on.
pub struct NetworkSetup {
    pub profile: NetworkProfile,
    pub client: Arc<dyn RpcClient>,
}

impl NetworkSetup {
    pub fn new(profile: NetworkProfile, client: Arc<dyn RpcClient>) -> Self {
        Self { profile, client }
    }
}

pub struct ComparisonCoordinator {
    monitors: BTreeMap<Network, Arc<NetworkBlockMonitor>>,
    race: Arc<LatencyRace>,
}

impl ComparisonCoordinator {
    /// Monitors and race all report to the same `events` sender.
    pub fn new(
        setups: [NetworkSetup; 2],
        recipient: &str,
        clock: Arc<dyn Clock>,
        events: EventSender,
    ) -> Result<Self, CoordinatorError> {
        let mut monitors = BTreeMap::new();
        let mut clients = BTreeMap::new();

        for NetworkSetup { profile, client } in setups {
            let network = profile.network;
            if monitors.contains_key(&network) {
                return Err(CoordinatorError::DuplicateNetwork(network));
            }

            let monitor = NetworkBlockMonitor::new(Arc::new(profile), client.clone(), events.clone());
            monitors.insert(network, Arc::new(monitor));
            clients.insert(network, client);
        }

        let race = LatencyRace::new(clients, recipient, clock, events);

        Ok(Self {
            monitors,
            race: Arc::new(race),
        })
    }

    pub fn start(&self) -> Result<(), CoordinatorError> {
        for monitor in self.monitors.values() {
            monitor.start()?;
        }

        info!("started comparison");

        Ok(())
    }

    /// Stops both monitors and abandons a race in progress. Calls already issued keep running, their
    /// results are ignored.
    pub fn stop(&self) {
        for monitor in self.monitors.values() {
            monitor.stop();
        }
        self.race.abandon();

        info!("stopped comparison");
    }

    pub fn is_running(&self) -> bool {
        self.monitors.values().any(|monitor| monitor.is_running())
    }

    pub fn monitor(&self, network: Network) -> Option<&Arc<NetworkBlockMonitor>> {
        self.monitors.get(&network)
    }

    pub fn monitors(&self) -> impl Iterator<Item = &Arc<NetworkBlockMonitor>> {
        self.monitors.values()
    }

    pub fn race(&self) -> &Arc<LatencyRace> {
        &self.race
    }

    pub fn start_race(
        &self,
        amount: WeiNewtype,
        networks: &[Network],
    ) -> Result<AttemptId, CoordinatorError> {
        Ok(self.race.start(amount, networks)?)
    }
}
