//! Bounded transcript of recent messages for prompts.

use crate::model::ChatEventRecord;
use std::fmt::Write;

/// Default number of records kept in a window.
pub const DEFAULT_MAX_RECORDS: usize = 50;

/// Display name for senders with neither handle nor name.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Selects the most recent records and renders them as `name: text` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    /// Upper bound on records considered.
    pub max_records: usize,
    /// Text placed before the first line.
    pub prefix: String,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS)
    }
}

impl ContextWindow {
    /// Window keeping at most `max_records`.
    pub fn new(max_records: usize) -> Self {
        Self {
            max_records,
            prefix: String::new(),
        }
    }

    /// Set the leading text.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Most recent `max_records`, oldest first.
    ///
    /// Sorting is stable, so records sharing a timestamp keep their input
    /// order.
    pub fn select(&self, mut records: Vec<ChatEventRecord>) -> Vec<ChatEventRecord> {
        records.sort_by_key(|record| record.created_at);
        let start = records.len().saturating_sub(self.max_records);
        records.split_off(start)
    }

    /// Render the selected records; records without text are skipped but
    /// still count against the bound.
    pub fn render(&self, records: Vec<ChatEventRecord>) -> String {
        let mut out = self.prefix.clone();
        for record in self.select(records) {
            let Some(text) = record.text() else {
                continue;
            };
            let name = record
                .sender()
                .map(|sender| sender.display_name())
                .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string());
            let _ = writeln!(out, "{name}: {text}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::ContextWindow;
    use crate::model::{ChatEventRecord, UpdatePayload};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn record(created_at: i64, from: Value, text: Option<&str>) -> ChatEventRecord {
        let mut message = json!({ "chat": { "id": 1 }, "from": from });
        if let Some(text) = text {
            message["text"] = json!(text);
        }
        let mut record =
            ChatEventRecord::from_update(UpdatePayload::new(json!({ "message": message })));
        record.created_at = created_at;
        record
    }

    #[test]
    fn keeps_latest_records_in_time_order() {
        let records = vec![
            record(300, json!({ "username": "c" }), Some("third")),
            record(100, json!({ "username": "a" }), Some("first")),
            record(200, json!({ "username": "b" }), Some("second")),
        ];
        let window = ContextWindow::new(2);
        let kept: Vec<i64> = window
            .select(records.clone())
            .iter()
            .map(|r| r.created_at)
            .collect();
        assert_eq!(kept, vec![200, 300]);
        assert_eq!(window.render(records), "@b: second\n@c: third\n");
    }

    #[test]
    fn renders_names_and_skips_empty_text() {
        let records = vec![
            record(1, json!({ "first_name": "Ada", "last_name": "Lovelace" }), Some("hi")),
            record(2, json!({ "first_name": "Alan" }), None),
            record(3, json!({}), Some("anon")),
            record(4, json!({ "first_name": "Grace" }), Some("")),
        ];
        let rendered = ContextWindow::default()
            .with_prefix("Chat history:\n")
            .render(records);
        assert_eq!(rendered, "Chat history:\nAda Lovelace: hi\nUser: anon\n");
    }

    #[test]
    fn empty_input_renders_prefix_only() {
        let rendered = ContextWindow::new(10).with_prefix("p\n").render(Vec::new());
        assert_eq!(rendered, "p\n");
    }
}
