use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};

use super::TxHash;

fn parse_hex_u64<E: de::Error>(s: &str) -> Result<u64, E> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| E::custom(format!("expected 0x prefixed quantity, got {s}")))?;
    u64::from_str_radix(digits, 16).map_err(E::custom)
}

pub fn from_u64_hex_str<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_hex_u64(&s)
}

pub fn from_unix_timestamp_hex_str<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let timestamp = from_u64_hex_str(deserializer)?;
    let seconds = i64::try_from(timestamp).map_err(de::Error::custom)?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| de::Error::custom(format!("timestamp {seconds} out of range")))
}

/// Nodes return either bare hashes or full transaction objects depending on the request. We only
/// ever keep the hash.
#[derive(Deserialize)]
#[serde(untagged)]
enum TransactionRef {
    Hash(TxHash),
    Object { hash: TxHash },
}

pub fn from_transaction_refs<'de, D>(deserializer: D) -> Result<Vec<TxHash>, D::Error>
where
    D: Deserializer<'de>,
{
    let refs: Option<Vec<TransactionRef>> = Deserialize::deserialize(deserializer)?;
    Ok(refs
        .unwrap_or_default()
        .into_iter()
        .map(|tx| match tx {
            TransactionRef::Hash(hash) => hash,
            TransactionRef::Object { hash } => hash,
        })
        .collect())
}

pub fn from_optional_u64_hex_str<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| parse_hex_u64(&s)).transpose()
}
