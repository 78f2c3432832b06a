//! Fns to read variables from the environment more conveniently. RPC endpoints often carry API
//! keys, so they never show up in logs in full.

use std::{env, time::Duration};

use lazy_static::lazy_static;
use tracing::debug;

use crate::rpc::DEFAULT_CONFIRMATION_POLL_INTERVAL;

const SECRET_LOG_BLACKLIST: [&str; 2] = ["MONAD_RPC_URL", "HOLESKY_RPC_URL"];

lazy_static! {
    pub static ref ENV_CONFIG: EnvConfig = get_env_config();
}

fn obfuscate_if_secret(blacklist: &[&str], key: &str, value: &str) -> String {
    if blacklist.contains(&key) {
        let mut last_four = value.to_string();
        last_four.drain(0..value.len().saturating_sub(4));
        format!("****{last_four}")
    } else {
        value.to_string()
    }
}

/// Get an environment variable, encoding found or missing as Option, and panic otherwise.
pub fn get_env_var(key: &str) -> Option<String> {
    let var = match env::var(key) {
        Err(env::VarError::NotPresent) => None,
        Err(e) => panic!("{e}"),
        Ok(var) => Some(var),
    };

    if let Some(ref existing_var) = var {
        let output = obfuscate_if_secret(&SECRET_LOG_BLACKLIST, key, existing_var);
        debug!("env var {key}: {output}");
    } else {
        debug!("env var {key} requested but not found")
    };

    var
}

pub fn get_env_bool(key: &str) -> Option<bool> {
    get_env_var(key).map(|var| match var.to_lowercase().as_str() {
        "true" => true,
        "false" => false,
        "t" => true,
        "f" => false,
        "1" => true,
        "0" => false,
        str => panic!("invalid bool value {str} for {key}"),
    })
}

pub fn get_env_millis(key: &str) -> Option<Duration> {
    get_env_var(key).map(|var| match var.parse::<u64>() {
        Ok(millis) => Duration::from_millis(millis),
        Err(_) => panic!("invalid millisecond value {var} for {key}"),
    })
}

pub struct EnvConfig {
    pub monad_rpc_url: Option<String>,
    pub holesky_rpc_url: Option<String>,
    /// Node managed account that signs our race transactions.
    pub sender_address: Option<String>,
    pub recipient_address: Option<String>,
    pub confirmation_poll_interval: Duration,
    pub log_json: bool,
    pub log_perf: bool,
}

pub fn get_env_config() -> EnvConfig {
    let sender_address = get_env_var("SENDER_ADDRESS");
    // Without a recipient we send to ourselves.
    let recipient_address = get_env_var("RECIPIENT_ADDRESS").or_else(|| sender_address.clone());

    EnvConfig {
        monad_rpc_url: get_env_var("MONAD_RPC_URL"),
        holesky_rpc_url: get_env_var("HOLESKY_RPC_URL"),
        sender_address,
        recipient_address,
        confirmation_poll_interval: get_env_millis("CONFIRMATION_POLL_MS")
            .unwrap_or(DEFAULT_CONFIRMATION_POLL_INTERVAL),
        log_json: get_env_bool("LOG_JSON").unwrap_or(false),
        log_perf: get_env_bool("LOG_PERF").unwrap_or(false),
    }
}
