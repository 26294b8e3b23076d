use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use shared::utils::truncate_for_log;
use tracing::{debug, info};
use url::Url;

use crate::auth::BearerToken;
use crate::config::MAX_ERROR_BODY_BYTES;
use crate::error::CloudantError;
use crate::models::{
    AllDocsResponse, DatabaseCreation, DatabaseInfo, Document, DocumentAck, ErrorBody,
};

/// Thin client over the Cloudant / CouchDB HTTP API.
///
/// Holds one bearer token for its whole lifetime. Each operation is a
/// single outbound request with no retries.
#[derive(Debug, Clone)]
pub struct CloudantClient {
    client: Client,
    base_url: Url,
    token: BearerToken,
}

impl CloudantClient {
    pub fn new(client: Client, base_url: Url, token: BearerToken) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    /// Creates `db`. An existing database counts as success.
    pub async fn create_database(&self, db: &str) -> Result<DatabaseCreation, CloudantError> {
        let url = self.url(&[db])?;
        let response = self.request(Method::PUT, url).send().await?;

        match response.status() {
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                debug!("Database '{}' already exists", db);
                Ok(DatabaseCreation::AlreadyExists)
            }
            _ => {
                error_for_status(response, db).await?;
                info!("Created database '{}'", db);
                Ok(DatabaseCreation::Created)
            }
        }
    }

    pub async fn database_info(&self, db: &str) -> Result<DatabaseInfo, CloudantError> {
        let url = self.url(&[db])?;
        let response = self.request(Method::GET, url).send().await?;
        let response = error_for_status(response, db).await?;

        Ok(response.json().await?)
    }

    /// Lists every document in `db` with bodies included.
    pub async fn list_documents(&self, db: &str) -> Result<AllDocsResponse, CloudantError> {
        let url = self.url(&[db, "_all_docs"])?;
        let response = self
            .request(Method::GET, url)
            .query(&[("include_docs", "true")])
            .send()
            .await?;
        let response = error_for_status(response, db).await?;

        let listing: AllDocsResponse = response.json().await?;
        debug!("Listed {} rows from '{}'", listing.rows.len(), db);
        Ok(listing)
    }

    pub async fn add_document(
        &self,
        db: &str,
        doc: &Document,
    ) -> Result<DocumentAck, CloudantError> {
        let url = self.url(&[db])?;
        let response = self.request(Method::POST, url).json(doc).send().await?;
        let resource = format!("{}/{}", db, doc.id().unwrap_or("<generated>"));
        let response = error_for_status(response, &resource).await?;

        let ack = require_revision(response.json().await?, db)?;
        debug!("Added document {} to '{}'", ack.id, db);
        Ok(ack)
    }

    pub async fn get_document(&self, db: &str, id: &str) -> Result<Document, CloudantError> {
        let url = self.url(&[db, id])?;
        let response = self.request(Method::GET, url).send().await?;
        let response = error_for_status(response, &format!("{}/{}", db, id)).await?;

        Ok(response.json().await?)
    }

    /// Writes `doc` at `id`. The body must carry the current `_rev` when
    /// the document already exists.
    pub async fn put_document(
        &self,
        db: &str,
        id: &str,
        doc: &Document,
    ) -> Result<DocumentAck, CloudantError> {
        let url = self.url(&[db, id])?;
        let response = self.request(Method::PUT, url).json(doc).send().await?;
        let response = error_for_status(response, &format!("{}/{}", db, id)).await?;

        let ack = require_revision(response.json().await?, db)?;
        debug!("Wrote document {} in '{}' at rev {:?}", ack.id, db, ack.rev);
        Ok(ack)
    }

    pub async fn delete_document(
        &self,
        db: &str,
        id: &str,
        rev: &str,
    ) -> Result<DocumentAck, CloudantError> {
        let url = self.url(&[db, id])?;
        let response = self
            .request(Method::DELETE, url)
            .query(&[("rev", rev)])
            .send()
            .await?;
        let response = error_for_status(response, &format!("{}/{}", db, id)).await?;

        let ack: DocumentAck = response.json().await?;
        debug!("Deleted document {} from '{}'", id, db);
        Ok(ack)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, CloudantError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CloudantError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", self.token.authorization_header())
            .header("Accept", "application/json")
    }
}

fn require_revision(ack: DocumentAck, db: &str) -> Result<DocumentAck, CloudantError> {
    match ack.rev.as_deref() {
        Some(rev) if !rev.is_empty() => Ok(ack),
        _ => Err(CloudantError::MissingRevision(format!("{}/{}", db, ack.id))),
    }
}

async fn error_for_status(response: Response, resource: &str) -> Result<Response, CloudantError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    let body = truncate_for_log(&error_text, MAX_ERROR_BODY_BYTES).to_string();

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CloudantError::Unauthorized { status, body }
        }
        StatusCode::NOT_FOUND => CloudantError::NotFound(resource.to_string()),
        StatusCode::CONFLICT => {
            let reason = serde_json::from_str::<ErrorBody>(&error_text)
                .map(|e| e.reason)
                .unwrap_or_default();
            CloudantError::Conflict(format!("{}: {}", resource, reason))
        }
        _ => CloudantError::Status { status, body },
    })
}
