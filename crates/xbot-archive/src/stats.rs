//! Per-sender message counts.

use crate::model::{ChatEventRecord, Sender};
use serde::Serialize;
use std::collections::HashMap;

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderActivity {
    /// Platform user id.
    pub sender_id: i64,
    /// Name as rendered in transcripts.
    pub display_name: String,
    /// Messages counted for the sender.
    pub count: usize,
}

/// Rank senders by message count, highest first, truncated to `limit`.
///
/// Records without a sender id are ignored. Ties keep first-seen order.
pub fn activity_leaderboard(records: &[ChatEventRecord], limit: usize) -> Vec<SenderActivity> {
    let mut rows: Vec<(Sender, usize)> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    for sender in records.iter().filter_map(ChatEventRecord::sender) {
        let Some(id) = sender.id else {
            continue;
        };
        match index.get(&id) {
            Some(&position) => rows[position].1 += 1,
            None => {
                index.insert(id, rows.len());
                rows.push((sender, 1));
            }
        }
    }
    rows.sort_by(|left, right| right.1.cmp(&left.1));
    rows.into_iter()
        .take(limit)
        .filter_map(|(sender, count)| {
            Some(SenderActivity {
                sender_id: sender.id?,
                display_name: sender.display_name(),
                count,
            })
        })
        .collect()
}
