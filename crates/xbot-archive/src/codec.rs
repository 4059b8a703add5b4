//! JSON encoding of records for both backends.

use crate::error::ArchiveError;
use crate::model::ChatEventRecord;
use serde_json::{Map, Value};

/// Content type tagged on stored objects.
pub const CONTENT_TYPE: &str = "application/json";

/// Serialize a record to JSON bytes.
pub fn encode(record: &ChatEventRecord) -> Result<Vec<u8>, ArchiveError> {
    serde_json::to_vec(record).map_err(|err| ArchiveError::Encode(err.to_string()))
}

/// Parse JSON bytes into a record.
pub fn decode(bytes: &[u8]) -> Result<ChatEventRecord, ArchiveError> {
    serde_json::from_slice(bytes).map_err(|err| ArchiveError::Decode(err.to_string()))
}

/// Convert a record into a document with the id stored under `_id`.
pub fn to_document(record: &ChatEventRecord) -> Result<Value, ArchiveError> {
    let value =
        serde_json::to_value(record).map_err(|err| ArchiveError::Encode(err.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(ArchiveError::Encode("record is not a JSON object".to_string()));
    };
    if let Some(id) = fields.remove("id") {
        fields.insert("_id".to_string(), id);
    }
    Ok(Value::Object(fields))
}

/// Convert a stored document back into a record.
///
/// Accepts both plain string ids and extended-JSON object ids.
pub fn from_document(document: Value) -> Result<ChatEventRecord, ArchiveError> {
    let Value::Object(mut fields) = document else {
        return Err(ArchiveError::Decode("document is not a JSON object".to_string()));
    };
    if let Some(id) = fields.remove("_id") {
        fields.insert("id".to_string(), normalize_id(id)?);
    }
    serde_json::from_value(Value::Object(fields)).map_err(|err| ArchiveError::Decode(err.to_string()))
}

/// Rewrite an extended-JSON `_id` in place as a plain string.
pub(crate) fn flatten_document_id(document: &mut Value) -> Result<(), ArchiveError> {
    if let Some(fields) = document.as_object_mut() {
        if let Some(id) = fields.remove("_id") {
            fields.insert("_id".to_string(), normalize_id(id)?);
        }
    }
    Ok(())
}

fn normalize_id(id: Value) -> Result<Value, ArchiveError> {
    match id {
        Value::String(_) => Ok(id),
        Value::Object(ref inner) => object_id_hex(inner)
            .map(|hex| Value::String(hex.to_string()))
            .ok_or_else(|| ArchiveError::Decode(format!("unsupported document id: {id}"))),
        Value::Number(number) => Ok(Value::String(number.to_string())),
        other => Err(ArchiveError::Decode(format!("unsupported document id: {other}"))),
    }
}

fn object_id_hex(fields: &Map<String, Value>) -> Option<&str> {
    fields.get("$oid").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, from_document, to_document};
    use crate::error::ArchiveError;
    use crate::model::{ChatEventRecord, RecordId, UpdatePayload};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record() -> ChatEventRecord {
        ChatEventRecord {
            id: Some(RecordId::new("abc")),
            chat_id: Some(1),
            update: UpdatePayload::new(json!({ "message": { "chat": { "id": 1 }, "text": "x" } })),
            created_at: 10,
            updated_at: 10,
        }
    }

    #[test]
    fn documents_store_id_under_underscore_id() {
        let document = to_document(&record()).expect("document");
        assert_eq!(document["_id"], json!("abc"));
        assert!(document.get("id").is_none());
        assert_eq!(from_document(document).expect("record"), record());
    }

    #[test]
    fn legacy_object_ids_decode_as_hex_strings() {
        let document = json!({
            "_id": { "$oid": "65a1f0c2e4b0a1b2c3d4e5f6" },
            "chat_id": 1,
            "update": {},
            "created_at": 5,
            "updated_at": 5
        });
        let record = from_document(document).expect("record");
        assert_eq!(
            record.id.map(|id| id.to_string()),
            Some("65a1f0c2e4b0a1b2c3d4e5f6".to_string())
        );
    }

    #[test]
    fn legacy_field_casing_is_accepted() {
        let bytes = br#"{"ID":"x1","ChatID":9,"Update":{"update_id":3},"CreatedAt":7,"UpdatedAt":7}"#;
        let record = decode(bytes).expect("record");
        assert_eq!(record.chat_id, Some(9));
        assert_eq!(record.created_at, 7);
        assert_eq!(record.update.as_value(), &json!({ "update_id": 3 }));
    }

    #[test]
    fn edge_records_survive_bytes_and_documents() {
        let unassigned = ChatEventRecord {
            id: None,
            chat_id: None,
            update: UpdatePayload::new(json!({
                "poll_answer": { "poll_id": "p", "option_ids": [] }
            })),
            created_at: 0,
            updated_at: 0,
        };
        let supergroup = ChatEventRecord {
            id: Some(RecordId::new("neg")),
            chat_id: Some(-1_001_234_567_890),
            update: UpdatePayload::new(json!({
                "message": {
                    "chat": { "id": -1_001_234_567_890i64 },
                    "text": "привет 👋 こんにちは",
                    "entities": [[{ "type": "bold" }], [], [[1, 2], ["a", null]]]
                }
            })),
            created_at: i64::MAX,
            updated_at: i64::MAX,
        };
        let extreme = ChatEventRecord {
            chat_id: Some(i64::MIN),
            ..record()
        };

        for record in [unassigned, supergroup, extreme] {
            let bytes = encode(&record).expect("encode");
            assert_eq!(decode(&bytes).expect("decode"), record);
            let document = to_document(&record).expect("document");
            assert_eq!(from_document(document).expect("record"), record);
        }
    }

    #[test]
    fn invalid_bytes_are_decode_errors() {
        let err = decode(b"not json").expect_err("decode should fail");
        assert!(matches!(err, ArchiveError::Decode(_)));
        assert!(!err.is_retryable());
        let bytes = encode(&record()).expect("encode");
        assert_eq!(decode(&bytes).expect("record"), record());
    }
}
