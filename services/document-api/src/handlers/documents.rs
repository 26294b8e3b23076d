use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
};
use cloudant_client::{models::ID_FIELD, CloudantError, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::utils::generate_document_id;
use tracing::{debug, info};

use crate::{error::ApiError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub message: String,
    pub document: Document,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub rev: Option<String>,
}

pub async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    let store = state.document_store().await?;
    // A missing database is a server fault here, not a missing document.
    let documents = store
        .list_documents(state.db_name())
        .await
        .map_err(ApiError::Store)?
        .into_documents();

    debug!("Returning {} documents", documents.len());
    Ok(Json(documents))
}

pub async fn create_document(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let mut document = parse_document(&body)?;
    if document.is_empty() {
        return Err(ApiError::InvalidPayload("document has no fields".to_string()));
    }
    if !document.contains_key(ID_FIELD) {
        document.set_id(generate_document_id());
    } else if document.id().is_none() {
        return Err(ApiError::InvalidPayload("_id must be a string".to_string()));
    }

    let store = state.document_store().await?;
    let ack = store.add_document(state.db_name(), &document).await?;

    info!("Created document {}", ack.id);
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Document created successfully".to_string(),
            id: ack.id,
        }),
    ))
}

pub async fn get_document(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Document>, ApiError> {
    let Path(id) = path?;
    let store = state.document_store().await?;
    let document = store.get_document(state.db_name(), &id).await?;

    Ok(Json(document))
}

/// Merges the payload fields over the stored document and writes it back.
/// A `_rev` in the payload is forwarded so stale writes are rejected.
pub async fn update_document(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let Path(id) = path?;
    let fields = parse_document(&body)?;

    let store = state.document_store().await?;
    let mut document = store.get_document(state.db_name(), &id).await?;
    document.merge(fields);

    let ack = store.put_document(state.db_name(), &id, &document).await?;
    if let Some(rev) = ack.rev {
        document.set_rev(rev);
    }

    info!("Updated document {}", id);
    Ok(Json(UpdatedResponse {
        message: "Document updated successfully.".to_string(),
        document,
    }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let Path(id) = path?;
    let Query(params) = query?;
    let store = state.document_store().await?;

    let rev = match params.rev.filter(|rev| !rev.is_empty()) {
        Some(rev) => rev,
        None => {
            let current = store.get_document(state.db_name(), &id).await?;
            current
                .rev()
                .map(str::to_string)
                .ok_or_else(|| CloudantError::MissingRevision(format!("{}/{}", state.db_name(), id)))?
        }
    };

    store.delete_document(state.db_name(), &id, &rev).await?;

    info!("Deleted document {}", id);
    Ok(Json(DeletedResponse {
        message: "Document deleted successfully.".to_string(),
    }))
}

fn parse_document(body: &[u8]) -> Result<Document, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::InvalidPayload("missing request body".to_string()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidPayload(format!("malformed JSON: {}", e)))?;

    Document::try_from(value)
        .map_err(|_| ApiError::InvalidPayload("expected a JSON object".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_accepts_object() {
        let doc = parse_document(br#"{"name": "Test"}"#).unwrap();
        assert_eq!(doc.get("name"), Some(&Value::String("Test".into())));
    }

    #[test]
    fn test_parse_document_rejects_empty_body() {
        assert!(matches!(parse_document(b""), Err(ApiError::InvalidPayload(_))));
        assert!(matches!(parse_document(b"  \n"), Err(ApiError::InvalidPayload(_))));
    }

    #[test]
    fn test_parse_document_rejects_non_objects() {
        for body in [&b"[1,2]"[..], b"\"text\"", b"null", b"{not json"] {
            assert!(matches!(parse_document(body), Err(ApiError::InvalidPayload(_))));
        }
    }
}
