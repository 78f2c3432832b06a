//! The two networks we compare and their static profiles.

use std::{fmt::Display, str::FromStr, time::Duration};

use enum_iterator::{all, Sequence};
use thiserror::Error;

use crate::{blocks::BlockNumber, env::ENV_CONFIG};

pub const DEFAULT_WINDOW_CAPACITY: usize = 10;
pub const DEFAULT_DISPLAY_TRANSACTION_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence)]
pub enum Network {
    Monad,
    Holesky,
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Monad => write!(f, "monad"),
            Network::Holesky => write!(f, "holesky"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseNetworkError {
    #[error("unknown network {0}, expected monad or holesky")]
    UnknownNetwork(String),
}

impl FromStr for Network {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monad" => Ok(Network::Monad),
            "holesky" => Ok(Network::Holesky),
            unknown => Err(ParseNetworkError::UnknownNetwork(unknown.to_string())),
        }
    }
}

/// `both` or a single network name.
pub fn parse_network_selection(input: &str) -> Result<Vec<Network>, ParseNetworkError> {
    if input.eq_ignore_ascii_case("both") {
        Ok(all::<Network>().collect())
    } else {
        input.parse().map(|network| vec![network])
    }
}

/// Static configuration for one network. Built once at start-up and shared behind an `Arc`, never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkProfile {
    pub network: Network,
    pub name: &'static str,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,
    pub currency_symbol: &'static str,
    /// How often the network is expected to produce a block, also our polling interval.
    pub expected_block_interval: Duration,
    pub window_capacity: usize,
    pub display_transaction_limit: usize,
}

impl NetworkProfile {
    pub fn monad_testnet() -> Self {
        Self {
            network: Network::Monad,
            name: "Monad Testnet",
            chain_id: 10143,
            rpc_url: "https://testnet-rpc.monad.xyz/".to_string(),
            explorer_url: "https://testnet.monadexplorer.com/".to_string(),
            currency_symbol: "MON",
            expected_block_interval: Duration::from_millis(1000),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            display_transaction_limit: DEFAULT_DISPLAY_TRANSACTION_LIMIT,
        }
    }

    pub fn holesky() -> Self {
        Self {
            network: Network::Holesky,
            name: "Holesky Testnet",
            chain_id: 17000,
            rpc_url: "https://holesky.drpc.org".to_string(),
            explorer_url: "https://holesky.etherscan.io/".to_string(),
            currency_symbol: "ETH",
            expected_block_interval: Duration::from_millis(15000),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            display_transaction_limit: DEFAULT_DISPLAY_TRANSACTION_LIMIT,
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Monad => Self::monad_testnet(),
            Network::Holesky => Self::holesky(),
        }
    }

    /// Built-in profile with the RPC endpoint overridden from the environment when set.
    pub fn from_env(network: Network) -> Self {
        let profile = Self::for_network(network);
        let rpc_url = match network {
            Network::Monad => ENV_CONFIG.monad_rpc_url.clone(),
            Network::Holesky => ENV_CONFIG.holesky_rpc_url.clone(),
        };

        match rpc_url {
            Some(rpc_url) => profile.with_rpc_url(&rpc_url),
            None => profile,
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: &str) -> Self {
        self.rpc_url = rpc_url.to_string();
        self
    }

    pub fn with_expected_block_interval(mut self, interval: Duration) -> Self {
        self.expected_block_interval = interval;
        self
    }

    /// A window always holds at least the latest block.
    pub fn with_window_capacity(mut self, window_capacity: usize) -> Self {
        self.window_capacity = window_capacity.max(1);
        self
    }

    fn explorer_base(&self) -> &str {
        self.explorer_url.trim_end_matches('/')
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_base())
    }

    pub fn block_url(&self, block_number: BlockNumber) -> String {
        format!("{}/block/{block_number}", self.explorer_base())
    }
}
