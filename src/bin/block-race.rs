use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use block_race::{
    clock::SystemClock,
    env::ENV_CONFIG,
    events::{self, EventReceiver},
    interactive::{self, Command, CommandOutcome, HELP},
    log,
    network::parse_network_selection,
    render::Renderer,
    units::WeiNewtype,
    ComparisonCoordinator, JsonRpcClient, LatencyRace, Network, NetworkProfile, NetworkSetup,
    RpcClient,
};
use clap::Parser;
use console::Term;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Shows the latest blocks of both networks side by side and reads commands from stdin.
    Watch {
        /// Start with parent hash, gas limit and transactions shown.
        #[clap(long)]
        expanded: bool,
    },
    /// Sends one transfer per network and reports how long each took to confirm.
    Race {
        /// Amount in ETH, e.g. 0.001.
        #[clap(long)]
        amount: String,
        /// both, monad or holesky.
        #[clap(long, default_value = "both")]
        network: String,
        /// Defaults to RECIPIENT_ADDRESS, then to the sender.
        #[clap(long)]
        to: Option<String>,
    },
}

fn client_for(profile: &NetworkProfile) -> Arc<dyn RpcClient> {
    let client = JsonRpcClient::for_profile(profile)
        .with_confirmation_poll_interval(ENV_CONFIG.confirmation_poll_interval);

    match &ENV_CONFIG.sender_address {
        Some(sender_address) => Arc::new(client.with_sender_address(sender_address)),
        None => Arc::new(client),
    }
}

async fn watch(expanded: bool) -> Result<()> {
    let setups = [Network::Monad, Network::Holesky].map(|network| {
        let profile = NetworkProfile::from_env(network);
        let client = client_for(&profile);
        NetworkSetup::new(profile, client)
    });
    let renderer = Renderer::new(setups.iter().map(|setup| setup.profile.clone()));

    let recipient = ENV_CONFIG.recipient_address.clone().unwrap_or_else(|| {
        warn!("no SENDER_ADDRESS or RECIPIENT_ADDRESS set, races will fail to send");
        String::new()
    });

    let (events, mut rx) = events::channel();
    let coordinator =
        ComparisonCoordinator::new(setups, &recipient, Arc::new(SystemClock), events)?;
    coordinator.start()?;

    if expanded {
        for monitor in coordinator.monitors() {
            monitor.toggle_expanded();
        }
    }

    let term = Term::stdout();
    term.write_line(HELP)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                for line in renderer.render(&event) {
                    term.write_line(&line)?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                if line.trim().is_empty() {
                    continue;
                }

                match line.parse::<Command>() {
                    Ok(command) => match interactive::apply(&coordinator, command) {
                        Ok(CommandOutcome::Continue(reply)) => term.write_line(&reply)?,
                        Ok(CommandOutcome::Quit) => break,
                        Err(err) => term.write_line(&err.to_string())?,
                    },
                    Err(err) => term.write_line(&format!("{err}, {HELP}"))?,
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    coordinator.stop();

    Ok(())
}

async fn render_until_settled(
    race: &LatencyRace,
    renderer: &Renderer,
    rx: &mut EventReceiver,
) -> Result<()> {
    let term = Term::stdout();

    loop {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(event)) => {
                for line in renderer.render(&event) {
                    term.write_line(&line)?;
                }
            }
            Ok(None) => break,
            // Nothing queued and nothing left in flight.
            Err(_) if !race.is_running() => break,
            Err(_) => {}
        }
    }

    Ok(())
}

async fn race(amount: &str, network: &str, to: Option<String>) -> Result<()> {
    let amount = WeiNewtype::from_eth_str(amount)
        .with_context(|| format!("invalid amount {amount}"))?;
    let networks = parse_network_selection(network)?;
    let recipient = to
        .or_else(|| ENV_CONFIG.recipient_address.clone())
        .context("no recipient, pass --to or set RECIPIENT_ADDRESS or SENDER_ADDRESS")?;

    let profiles: BTreeMap<Network, NetworkProfile> = networks
        .iter()
        .map(|network| (*network, NetworkProfile::from_env(*network)))
        .collect();
    let clients = profiles
        .iter()
        .map(|(network, profile)| (*network, client_for(profile)))
        .collect();

    let (events, mut rx) = events::channel();
    let race = Arc::new(LatencyRace::new(
        clients,
        &recipient,
        Arc::new(SystemClock),
        events,
    ));
    let renderer = Renderer::new(profiles.into_values());

    let attempt = race.start(amount, &networks)?;
    info!(attempt, "race started");

    tokio::select! {
        rendered = render_until_settled(&race, &renderer, &mut rx) => rendered?,
        _ = tokio::signal::ctrl_c() => race.abandon(),
    }

    Ok(())
}

#[tokio::main]
pub async fn main() -> Result<()> {
    log::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { expanded } => watch(expanded).await,
        Commands::Race {
            amount,
            network,
            to,
        } => race(&amount, &network, to).await,
    }
}
