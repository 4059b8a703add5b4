//! Builders for inbound platform events.

use serde_json::{Value, json};
use xbot_archive::UpdatePayload;

/// Text message from a user with a handle.
pub fn text_update(chat_id: i64, from_id: i64, username: &str, text: &str) -> UpdatePayload {
    message_update(
        chat_id,
        json!({ "id": from_id, "is_bot": false, "username": username }),
        text,
    )
}

/// Text message with an arbitrary `from` object.
pub fn message_update(chat_id: i64, from: Value, text: &str) -> UpdatePayload {
    UpdatePayload::new(json!({
        "update_id": chat_id.unsigned_abs(),
        "message": {
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": { "id": chat_id, "type": "group" },
            "from": from,
            "text": text,
        }
    }))
}

/// Vote on a poll; carries no conversation id.
pub fn poll_answer_update(poll_id: &str, voter_id: i64, option_ids: &[i64]) -> UpdatePayload {
    UpdatePayload::new(json!({
        "update_id": 2,
        "poll_answer": {
            "poll_id": poll_id,
            "user": { "id": voter_id, "is_bot": false, "first_name": "Voter" },
            "option_ids": option_ids,
        }
    }))
}
