use chrono::Utc;
use cloudant_client::{CloudantError, DatabaseCreation, Document};
use serde_json::json;
use shared::utils::generate_document_id;
use tracing::{info, warn};

use crate::AppState;

#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub database: DatabaseCreation,
    pub seeded_document: Option<String>,
}

/// Makes sure the configured database exists and, when enabled, seeds one
/// sample document into it if it is empty.
pub async fn prepare_database(state: &AppState) -> Result<BootstrapReport, CloudantError> {
    let store = state.document_store().await?;
    let db = state.db_name();

    let database = store.create_database(db).await?;
    info!("Database '{}' ready ({:?})", db, database);

    let mut seeded_document = None;
    if state.config.seed_empty_database {
        let db_info = store.database_info(db).await?;
        if db_info.doc_count == 0 {
            warn!("No documents found in '{}', inserting a sample document", db);
            let ack = store.add_document(db, &sample_document()).await?;
            info!("Sample document {} inserted", ack.id);
            seeded_document = Some(ack.id);
        }
    }

    Ok(BootstrapReport {
        database,
        seeded_document,
    })
}

fn sample_document() -> Document {
    let mut doc = Document::new();
    doc.set_id(generate_document_id());
    doc.insert("name", json!("Test Document"));
    doc.insert("timestamp", json!(Utc::now().format("%Y-%m-%d").to_string()));
    doc
}
