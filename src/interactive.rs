//! Commands typed into a running `watch` session.

use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::{
    blocks::BlockHash,
    coordinator::{ComparisonCoordinator, CoordinatorError},
    monitor::NetworkBlockMonitor,
    network::{parse_network_selection, Network, ParseNetworkError},
    units::{ParseEthAmountError, WeiNewtype},
};

pub const HELP: &str = "commands: pause <network> | select <network> <hash> | expand <network> | \
                        race <amount> [network] | abandon | quit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Pause(Network),
    Select(Network, BlockHash),
    Expand(Network),
    Race {
        amount: WeiNewtype,
        networks: Vec<Network>,
    },
    Abandon,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Network(#[from] ParseNetworkError),
    #[error(transparent)]
    Amount(#[from] ParseEthAmountError),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();

        match words.as_slice() {
            [] => Err(ParseCommandError::Empty),
            ["pause", network] => Ok(Command::Pause(network.parse()?)),
            ["pause", ..] => Err(ParseCommandError::Usage("pause <network>")),
            ["select", network, hash] => Ok(Command::Select(network.parse()?, hash.to_string())),
            ["select", ..] => Err(ParseCommandError::Usage("select <network> <hash>")),
            ["expand", network] => Ok(Command::Expand(network.parse()?)),
            ["expand", ..] => Err(ParseCommandError::Usage("expand <network>")),
            ["race", amount] => Ok(Command::Race {
                amount: WeiNewtype::from_eth_str(amount)?,
                networks: parse_network_selection("both")?,
            }),
            ["race", amount, networks] => Ok(Command::Race {
                amount: WeiNewtype::from_eth_str(amount)?,
                networks: parse_network_selection(networks)?,
            }),
            ["race", ..] => Err(ParseCommandError::Usage("race <amount> [network]")),
            ["abandon"] => Ok(Command::Abandon),
            ["quit"] | ["exit"] => Ok(Command::Quit),
            [unknown, ..] => Err(ParseCommandError::Unknown(unknown.to_string())),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum CommandOutcome {
    /// Keep reading commands, with a line to show the user.
    Continue(String),
    Quit,
}

fn with_monitor(
    coordinator: &ComparisonCoordinator,
    network: Network,
    f: impl FnOnce(&NetworkBlockMonitor) -> String,
) -> String {
    match coordinator.monitor(network) {
        Some(monitor) => f(monitor),
        None => format!("no monitor for {network}"),
    }
}

pub fn apply(
    coordinator: &ComparisonCoordinator,
    command: Command,
) -> Result<CommandOutcome, CoordinatorError> {
    debug!(?command, "applying command");

    let reply = match command {
        Command::Pause(network) => with_monitor(coordinator, network, |monitor| {
            if monitor.toggle_pause() {
                format!("{network} paused")
            } else {
                format!("{network} resumed")
            }
        }),
        Command::Select(network, hash) => with_monitor(coordinator, network, |monitor| {
            if monitor.select_block(&hash) {
                format!("{network} showing {hash}")
            } else {
                format!("{network} has no block {hash} in its window")
            }
        }),
        Command::Expand(network) => with_monitor(coordinator, network, |monitor| {
            if monitor.toggle_expanded() {
                format!("{network} expanded")
            } else {
                format!("{network} collapsed")
            }
        }),
        Command::Race { amount, networks } => {
            let attempt = coordinator.start_race(amount, &networks)?;
            format!(
                "race {attempt} started, sending {} on {}",
                amount.to_eth_string(),
                networks
                    .iter()
                    .map(Network::to_string)
                    .collect::<Vec<_>>()
                    .join(" and ")
            )
        }
        Command::Abandon => {
            let race = coordinator.race();
            if race.is_running() {
                let attempt = race.current_attempt();
                race.abandon();
                format!("race {attempt} abandoned")
            } else {
                "no race running".to_string()
            }
        }
        Command::Quit => return Ok(CommandOutcome::Quit),
    };

    Ok(CommandOutcome::Continue(reply))
}
