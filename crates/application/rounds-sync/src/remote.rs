use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rounds_core::PickupSchedule;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection holding one document per pickup stop.
pub const SCHEDULES_COLLECTION: &str = "pickupSchedules";

/// Errors from the remote document store. The engine treats every variant
/// uniformly as "remote unavailable"; the distinction exists for logs and
/// for diagnostic surfaces only.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid remote url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("remote unavailable: {0}")]
    Unavailable(String),
}

/// Equality predicate on a document field, the only predicate shape the
/// store interface supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

impl Document {
    /// Decode into a schedule. The document id wins over any `scheduleId`
    /// stored inside the body.
    pub fn into_schedule(self) -> Result<PickupSchedule, serde_json::Error> {
        let mut fields = self.fields;
        if let Value::Object(ref mut map) = fields {
            map.insert("scheduleId".to_string(), Value::String(self.id));
        }
        serde_json::from_value(fields)
    }
}

/// Remote document store, consumed by collection and document id. All
/// calls are single-attempt; the pending queue is the retry strategy.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError>;

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, RemoteError>;

    /// Upsert, full replace.
    async fn set(&self, collection: &str, id: &str, fields: &Value) -> Result<(), RemoteError>;

    /// Partial merge into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: &Value) -> Result<(), RemoteError>;
}

/// HTTP adapter for a REST-shaped document store:
/// GET/PUT/PATCH `{base}/{collection}/{id}` for single documents (GET
/// returns the raw fields object), GET `{base}/{collection}` with
/// `field=value` pairs and an optional `limit` for queries (returns an
/// array of `{id, fields}` objects).
pub struct HttpDocumentStore {
    client: Client,
    base: Url,
}

/// Normalize the configured URL so it can be used as a *directory base*.
/// Without the trailing slash, joining would replace the last path segment
/// instead of appending to it.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<Url, RemoteError> {
    let mut url = Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl {
        url: base_url.to_string(),
        message: e.to_string(),
    })?;
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    Ok(url)
}

impl HttpDocumentStore {
    pub fn new(client: Client, base_url: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            client,
            base: normalize_base_url(base_url)?,
        })
    }

    fn collection_url(&self, collection: &str) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| RemoteError::InvalidUrl {
                url: self.base.to_string(),
                message: "cannot be a base".to_string(),
            })?;
            segments.pop_if_empty();
            segments.push(collection);
        }
        Ok(url)
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url, RemoteError> {
        let mut url = self.collection_url(collection)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| RemoteError::InvalidUrl {
                url: self.base.to_string(),
                message: "cannot be a base".to_string(),
            })?;
            segments.push(id);
        }
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let url = self.document_url(collection, id)?;
        let resp = self.client.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status()));
        }
        let fields: Value = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(Some(Document {
            id: id.to_string(),
            fields,
        }))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, RemoteError> {
        let mut url = self.collection_url(collection)?;
        {
            let mut pairs = url.query_pairs_mut();
            for filter in filters {
                pairs.append_pair(&filter.field, &filter.value);
            }
            if let Some(n) = limit {
                pairs.append_pair("limit", &n.to_string());
            }
        }
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status()));
        }
        Ok(serde_json::from_slice(&resp.bytes().await?)?)
    }

    async fn set(&self, collection: &str, id: &str, fields: &Value) -> Result<(), RemoteError> {
        let url = self.document_url(collection, id)?;
        let resp = self.client.put(url).json(fields).send().await?;
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status()));
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: &Value) -> Result<(), RemoteError> {
        let url = self.document_url(collection, id)?;
        let resp = self.client.patch(url).json(fields).send().await?;
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base_url("https://store.example.com/v1").unwrap();
        assert_eq!(url.as_str(), "https://store.example.com/v1/");
        let already = normalize_base_url("https://store.example.com/v1/").unwrap();
        assert_eq!(already.as_str(), "https://store.example.com/v1/");
    }

    #[test]
    fn document_url_appends_collection_and_id() {
        let store =
            HttpDocumentStore::new(Client::new(), "https://store.example.com/v1").unwrap();
        let url = store.document_url("pickupSchedules", "sched-1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://store.example.com/v1/pickupSchedules/sched-1"
        );
    }

    #[test]
    fn document_id_wins_over_embedded_field() {
        let doc = Document {
            id: "doc-id".to_string(),
            fields: serde_json::json!({
                "scheduleId": "stale-id",
                "areaInfo": "Harbor Market Row",
                "pickupDate": "2025-05-30",
                "status": "Pending",
                "assignedCollectorId": "collector123",
            }),
        };
        let schedule = doc.into_schedule().unwrap();
        assert_eq!(schedule.schedule_id, "doc-id");
    }

    #[test]
    fn document_without_embedded_id_still_decodes() {
        let doc = Document {
            id: "doc-id".to_string(),
            fields: serde_json::json!({
                "areaInfo": "Cedar Lane North",
                "pickupDate": "2025-05-30",
                "status": "On Hold",
                "assignedCollectorId": "collector123",
                "reason": "access blocked",
            }),
        };
        let schedule = doc.into_schedule().unwrap();
        assert_eq!(schedule.schedule_id, "doc-id");
        assert_eq!(schedule.reason.as_deref(), Some("access blocked"));
    }
}
