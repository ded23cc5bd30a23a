//! Activity feed built from transfer logs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Address, Amount, Result, Token, TransferLog, TxHash};

/// Number of entries shown in the activity feed.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Direction of a transfer relative to the wallet owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// Owner paid someone
    Sent,
    /// Owner was paid
    Received,
}

/// One entry of the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// `<tx hash>-<log index>`
    pub id: String,
    pub tx_hash: TxHash,
    pub direction: TransferDirection,
    pub amount: Amount,
    /// Sender for received transfers, recipient for sent ones.
    pub counterparty: Address,
    pub block_number: u64,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Turn raw logs into the owner's activity feed.
///
/// Logs are deduplicated by transaction hash and log index, ordered newest
/// block first and capped at `limit`. Zero-amount entries are dropped after
/// the cap, so the feed can come out shorter than `limit`.
pub fn build_history(
    owner: &Address,
    token: &Token,
    logs: &[TransferLog],
    limit: usize,
) -> Result<Vec<TransactionRecord>> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&TransferLog> = logs
        .iter()
        .filter(|log| &log.from == owner || &log.to == owner)
        .filter(|log| seen.insert((log.tx_hash, log.log_index)))
        .collect();
    unique.sort_by(|a, b| b.block_number.cmp(&a.block_number));

    let mut records = Vec::with_capacity(unique.len().min(limit));
    for log in unique.into_iter().take(limit) {
        if log.amount == 0 {
            continue;
        }
        let (direction, counterparty) = if &log.from == owner {
            (TransferDirection::Sent, log.to)
        } else {
            (TransferDirection::Received, log.from)
        };
        let memo = log
            .memo
            .map(|m| m.to_text())
            .filter(|text| !text.is_empty());
        records.push(TransactionRecord {
            id: format!("{}-{}", log.tx_hash, log.log_index),
            tx_hash: log.tx_hash,
            direction,
            amount: token.to_amount(log.amount)?,
            counterparty,
            block_number: log.block_number,
            timestamp: log.timestamp,
            memo,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Memo;

    fn log(block: u64, index: u32, from: Address, to: Address, amount: u128) -> TransferLog {
        let token = Token::alpha_usd();
        TransferLog {
            tx_hash: TxHash::of(&block.to_be_bytes()),
            log_index: index,
            block_number: block,
            timestamp: 1_800_000_000 + block as i64,
            token: token.address,
            from,
            to,
            amount,
            memo: None,
        }
    }

    #[test]
    fn test_history_dedup_sort_and_direction() {
        let me = Address::new([1; 20]);
        let other = Address::new([2; 20]);
        let mut logs = vec![
            log(1, 0, other, me, 5_000_000),
            log(3, 0, me, other, 2_000_000),
            log(2, 0, me, other, 0),
        ];
        logs.push(logs[1].clone());
        logs[1].memo = Some(Memo::from_text("StreamWave subscription").unwrap());

        let feed = build_history(&me, &Token::alpha_usd(), &logs, DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].block_number, 3);
        assert_eq!(feed[0].direction, TransferDirection::Sent);
        assert_eq!(feed[0].counterparty, other);
        assert_eq!(feed[0].memo.as_deref(), Some("StreamWave subscription"));
        assert_eq!(feed[1].direction, TransferDirection::Received);
        assert_eq!(feed[1].amount, Amount::from_units(5));
    }

    #[test]
    fn test_history_limit() {
        let me = Address::new([1; 20]);
        let other = Address::new([2; 20]);
        let logs: Vec<_> = (1..=30).map(|b| log(b, 0, me, other, 1_000_000)).collect();
        let feed = build_history(&me, &Token::alpha_usd(), &logs, DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(feed.len(), 20);
        assert_eq!(feed[0].block_number, 30);
        assert_eq!(feed[19].block_number, 11);
    }

    #[test]
    fn test_history_ignores_foreign_logs() {
        let me = Address::new([1; 20]);
        let a = Address::new([2; 20]);
        let b = Address::new([3; 20]);
        let feed = build_history(&me, &Token::alpha_usd(), &[log(1, 0, a, b, 10)], 20).unwrap();
        assert!(feed.is_empty());
    }
}
