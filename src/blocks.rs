pub mod decoders;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use self::decoders::{from_transaction_refs, from_u64_hex_str, from_unix_timestamp_hex_str};

pub type BlockNumber = u64;

/// Hash for a block, 0x prefixed hex.
pub type BlockHash = String;

pub type TxHash = String;

/// One fetched block. Blocks are immutable once fetched and identified by their hash.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: BlockHash,
    #[serde(deserialize_with = "from_u64_hex_str")]
    pub number: BlockNumber,
    pub parent_hash: BlockHash,
    #[serde(deserialize_with = "from_unix_timestamp_hex_str")]
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "from_u64_hex_str")]
    pub gas_used: u64,
    #[serde(deserialize_with = "from_u64_hex_str")]
    pub gas_limit: u64,
    #[serde(default, deserialize_with = "from_transaction_refs")]
    pub transactions: Vec<TxHash>,
}

impl Block {
    /// Share of the gas limit used, in percent, capped at 100.
    pub fn gas_used_percent(&self) -> f64 {
        if self.gas_limit == 0 {
            return 0.0;
        }

        (self.gas_used as f64 / self.gas_limit as f64 * 100.0).min(100.0)
    }
}

#[cfg(test)]
pub mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    pub struct BlockBuilder {
        hash: String,
        number: BlockNumber,
        parent_hash: String,
        timestamp: DateTime<Utc>,
        gas_used: u64,
        gas_limit: u64,
        transactions: Vec<TxHash>,
    }

    impl BlockBuilder {
        pub fn new(test_id: &str) -> Self {
            Self {
                hash: format!("0x{test_id}_block_hash"),
                number: 0,
                parent_hash: "0x0".to_string(),
                timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                gas_used: 0,
                gas_limit: 30_000_000,
                transactions: Vec::new(),
            }
        }

        /// A block with a hash derived from its number, so rebuilding the same number yields the
        /// same block.
        pub fn numbered(number: BlockNumber) -> Self {
            Self::new("numbered")
                .with_hash(&format!("0x{number:064x}"))
                .with_parent_hash(&format!("0x{:064x}", number.saturating_sub(1)))
                .with_number(number)
        }

        pub fn with_hash(mut self, hash: &str) -> Self {
            self.hash = hash.to_string();
            self
        }

        pub fn with_number(mut self, number: BlockNumber) -> Self {
            self.number = number;
            self.timestamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap()
                + Duration::seconds(number as i64);
            self
        }

        pub fn with_parent_hash(mut self, parent_hash: &str) -> Self {
            self.parent_hash = parent_hash.to_string();
            self
        }

        pub fn with_gas(mut self, gas_used: u64, gas_limit: u64) -> Self {
            self.gas_used = gas_used;
            self.gas_limit = gas_limit;
            self
        }

        pub fn with_transactions(mut self, count: usize) -> Self {
            self.transactions = (0..count)
                .map(|i| format!("0x{:064x}", (self.number << 16) + i as u64))
                .collect();
            self
        }

        pub fn build(&self) -> Block {
            Block {
                hash: self.hash.clone(),
                number: self.number,
                parent_hash: self.parent_hash.clone(),
                timestamp: self.timestamp,
                gas_used: self.gas_used,
                gas_limit: self.gas_limit,
                transactions: self.transactions.clone(),
            }
        }
    }

    #[test]
    fn decode_block_with_tx_hashes_test() {
        let value = json!({
            "hash": "0xb1",
            "number": "0x1b4",
            "parentHash": "0xb0",
            "timestamp": "0x6553f100",
            "gasUsed": "0x5208",
            "gasLimit": "0x1c9c380",
            "transactions": ["0xt1", "0xt2"],
            "miner": "0x0000000000000000000000000000000000000000"
        });

        let block = serde_json::from_value::<Block>(value).unwrap();

        assert_eq!(block.number, 436);
        assert_eq!(block.gas_used, 21_000);
        assert_eq!(block.gas_limit, 30_000_000);
        assert_eq!(block.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(block.transactions, vec!["0xt1", "0xt2"]);
    }

    #[test]
    fn decode_block_with_tx_objects_test() {
        let value = json!({
            "hash": "0xb1",
            "number": "0x1",
            "parentHash": "0xb0",
            "timestamp": "0x0",
            "gasUsed": "0x0",
            "gasLimit": "0x0",
            "transactions": [{ "hash": "0xt1", "value": "0x1" }]
        });

        let block = serde_json::from_value::<Block>(value).unwrap();

        assert_eq!(block.transactions, vec!["0xt1"]);
    }

    #[test]
    fn decode_block_without_transactions_test() {
        let value = json!({
            "hash": "0xb1",
            "number": "0x1",
            "parentHash": "0xb0",
            "timestamp": "0x0",
            "gasUsed": "0x0",
            "gasLimit": "0x0"
        });

        let block = serde_json::from_value::<Block>(value).unwrap();

        assert!(block.transactions.is_empty());
    }

    #[test]
    fn decode_bad_quantity_test() {
        let value = json!({
            "hash": "0xb1",
            "number": "12",
            "parentHash": "0xb0",
            "timestamp": "0x0",
            "gasUsed": "0x0",
            "gasLimit": "0x0"
        });

        assert!(serde_json::from_value::<Block>(value).is_err());
    }

    #[test]
    fn gas_used_percent_test() {
        let block = BlockBuilder::new("gas").with_gas(15, 30).build();
        assert_eq!(block.gas_used_percent(), 50.0);

        let block = BlockBuilder::new("no_limit").with_gas(15, 0).build();
        assert_eq!(block.gas_used_percent(), 0.0);
    }
}
