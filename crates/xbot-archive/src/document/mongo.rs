use super::{DocumentCollection, DocumentFilter};
use crate::error::ArchiveError;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use serde_json::Value;
use std::time::Duration;

/// Connected MongoDB database handle.
#[derive(Debug, Clone)]
pub struct MongoConnection {
    client: Client,
    database: Database,
}

impl MongoConnection {
    /// Connect and ping the database.
    ///
    /// Fails with [`ArchiveError::StorageUnavailable`] when the server cannot
    /// be selected within `server_selection_timeout`.
    pub async fn connect(
        uri: &str,
        database: &str,
        server_selection_timeout: Duration,
    ) -> Result<Self, ArchiveError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(server_selection_timeout);
        if options.app_name.is_none() {
            options.app_name = Some("xbot".to_string());
        }
        let client = Client::with_options(options)?;
        let database = client.database(database);
        database.run_command(doc! { "ping": 1 }).await?;
        info!("connected to mongodb (database={})", database.name());
        Ok(Self { client, database })
    }

    /// Handle to a named collection.
    pub fn collection(&self, name: &str) -> MongoCollection {
        MongoCollection {
            name: name.to_string(),
            inner: self.database.collection::<Document>(name),
        }
    }

    /// Underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// MongoDB collection exchanging documents as JSON values.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    name: String,
    inner: Collection<Document>,
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Value) -> Result<(), ArchiveError> {
        self.inner.insert_one(to_bson_document(&document)?).await?;
        Ok(())
    }

    async fn find(&self, filter: &DocumentFilter) -> Result<Vec<Value>, ArchiveError> {
        let mut cursor = self.inner.find(filter_document(filter)?).await?;
        let mut documents = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            documents.push(from_bson_document(document));
        }
        Ok(documents)
    }

    async fn find_one(&self, filter: &DocumentFilter) -> Result<Option<Value>, ArchiveError> {
        let found = self.inner.find_one(filter_document(filter)?).await?;
        Ok(found.map(from_bson_document))
    }

    async fn upsert_one(
        &self,
        filter: &DocumentFilter,
        document: Value,
    ) -> Result<(), ArchiveError> {
        self.inner
            .replace_one(filter_document(filter)?, to_bson_document(&document)?)
            .upsert(true)
            .await?;
        Ok(())
    }
}

fn to_bson_document(value: &Value) -> Result<Document, ArchiveError> {
    mongodb::bson::to_document(value).map_err(|err| ArchiveError::Encode(err.to_string()))
}

fn from_bson_document(document: Document) -> Value {
    Bson::Document(document).into_relaxed_extjson()
}

fn filter_document(filter: &DocumentFilter) -> Result<Document, ArchiveError> {
    let mut document = Document::new();
    for (field, value) in filter.fields() {
        let value =
            mongodb::bson::to_bson(value).map_err(|err| ArchiveError::Encode(err.to_string()))?;
        document.insert(field.clone(), value);
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::{filter_document, from_bson_document, to_bson_document};
    use crate::document::DocumentFilter;
    use mongodb::bson::{Bson, oid::ObjectId};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn filters_translate_to_bson() {
        let filter = DocumentFilter::new().equals("chat_id", -42).equals("type", "daily");
        let document = filter_document(&filter).expect("filter");
        assert_eq!(document.get("chat_id"), Some(&Bson::Int64(-42)));
        assert_eq!(document.get_str("type").expect("type"), "daily");
    }

    #[test]
    fn object_ids_come_back_as_extended_json() {
        let oid = ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").expect("oid");
        let mut document = to_bson_document(&json!({ "chat_id": 1, "created_at": 5 }))
            .expect("document");
        document.insert("_id", oid);
        let value = from_bson_document(document);
        assert_eq!(value["_id"], json!({ "$oid": "65a1f0c2e4b0a1b2c3d4e5f6" }));
        assert_eq!(value["created_at"], json!(5));
    }
}
