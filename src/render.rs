//! Turns core events into terminal lines.

use std::collections::BTreeMap;

use chrono::Local;
use console::style;

use crate::{
    blocks::Block,
    events::Event,
    monitor::MonitorState,
    network::{Network, NetworkProfile},
};

/// `0x12345678...9abcdef0`, hashes too short to shorten are returned as is.
pub fn short_hash(hash: &str) -> String {
    if hash.len() <= 18 || !hash.is_ascii() {
        return hash.to_string();
    }

    format!("{}...{}", &hash[..10], &hash[hash.len() - 8..])
}

/// Milliseconds as seconds with two decimals, `(1.23s)`.
pub fn format_duration(duration_ms: u64) -> String {
    format!("({:.2}s)", duration_ms as f64 / 1000.0)
}

pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }

    out
}

pub fn status_line(state: &MonitorState, displayed_block: &Block) -> String {
    if state.selected_block_hash.is_some() {
        format!("Viewing block #{}", displayed_block.number)
    } else if state.is_paused {
        "Updates paused".to_string()
    } else {
        "Latest blocks (newest first)".to_string()
    }
}

pub fn grid_line(blocks: &[Block], state: &MonitorState) -> String {
    blocks
        .iter()
        .map(|block| {
            let cell = format!("#{} {}tx", block.number, block.transactions.len());
            if state.selected_block_hash.as_ref() == Some(&block.hash) {
                format!("[{}]", style(cell).bold())
            } else {
                cell
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub struct Renderer {
    profiles: BTreeMap<Network, NetworkProfile>,
}

impl Renderer {
    pub fn new(profiles: impl IntoIterator<Item = NetworkProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.network, profile))
                .collect(),
        }
    }

    fn name(&self, network: Network) -> String {
        self.profiles
            .get(&network)
            .map_or_else(|| network.to_string(), |profile| profile.name.to_string())
    }

    fn tx_url(&self, network: Network, hash: &str) -> Option<String> {
        self.profiles
            .get(&network)
            .map(|profile| profile.tx_url(hash))
    }

    pub fn detail_lines(&self, network: Network, block: &Block, expanded: bool) -> Vec<String> {
        let time = block.timestamp.with_timezone(&Local).format("%H:%M:%S");
        let mut lines = vec![
            format!("Block #{} at {time}", block.number),
            format!("Hash: {}", block.hash),
            format!("Transactions: {}", block.transactions.len()),
            format!(
                "Gas used: {} ({:.1}%)",
                format_thousands(block.gas_used),
                block.gas_used_percent()
            ),
        ];

        if !expanded {
            return lines;
        }

        lines.push(format!("Parent hash: {}", block.parent_hash));
        lines.push(if block.gas_limit == 0 {
            "Gas limit: N/A".to_string()
        } else {
            format!("Gas limit: {}", format_thousands(block.gas_limit))
        });

        let profile = self.profiles.get(&network);
        if let Some(profile) = profile {
            lines.push(format!("Explorer: {}", profile.block_url(block.number)));
        }

        if block.transactions.is_empty() {
            lines.push("No transactions in this block".to_string());
            return lines;
        }

        let limit = profile.map_or(block.transactions.len(), |profile| {
            profile.display_transaction_limit
        });

        for tx_hash in block.transactions.iter().take(limit) {
            lines.push(format!("  {}", short_hash(tx_hash)));
        }

        if block.transactions.len() > limit {
            lines.push(format!(
                "+ {} more transactions",
                block.transactions.len() - limit
            ));
        }

        lines
    }

    pub fn render(&self, event: &Event) -> Vec<String> {
        match event {
            Event::WindowChanged {
                network,
                blocks,
                displayed_block,
                state,
            } => {
                let mut lines = vec![
                    style(format!("== {} ==", self.name(*network)))
                        .bold()
                        .to_string(),
                    style(status_line(state, displayed_block)).dim().to_string(),
                    grid_line(blocks, state),
                ];
                lines.extend(self.detail_lines(*network, displayed_block, state.is_expanded));
                lines
            }
            Event::LegCompleted {
                network,
                hash,
                duration_ms,
                ..
            } => {
                let mut lines = vec![format!(
                    "{} confirmed {} {}",
                    self.name(*network),
                    short_hash(hash),
                    style(format_duration(*duration_ms)).green()
                )];
                lines.extend(self.tx_url(*network, hash));
                lines
            }
            Event::LegFailed {
                network, reason, ..
            } => vec![format!(
                "{} failed: {}",
                self.name(*network),
                style(reason).red()
            )],
            Event::RaceCompared {
                faster_network,
                speed_factor,
                ..
            } => vec![match faster_network {
                Some(network) => format!(
                    "{} {}",
                    self.name(*network),
                    style(format!("{speed_factor:.1}x faster")).green().bold()
                ),
                None => "equal speed".to_string(),
            }],
        }
    }
}
