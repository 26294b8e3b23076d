mod common;

use axum::http::StatusCode;
use common::TEST_DB;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn test_health_check() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "document-api");
    assert_eq!(fixture.cloudant.token_requests(), 0);
}

#[tokio::test]
async fn test_create_without_id_generates_uuid() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture
        .server
        .post("/documents")
        .json(&json!({"name": "Test"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Document created successfully");
    let id = body["id"].as_str().unwrap();
    assert_eq!(id.len(), 36);
    assert!(Uuid::parse_str(id).is_ok());

    let response = fixture.server.get(&format!("/documents/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let doc: Value = response.json();
    assert_eq!(doc["name"], "Test");
    assert_eq!(doc["_id"], id);
    assert!(doc["_rev"].as_str().is_some());
}

#[tokio::test]
async fn test_generated_ids_are_unique() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let body: Value = fixture
            .server
            .post("/documents")
            .json(&json!({"name": "same payload"}))
            .await
            .json();
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_create_with_explicit_id() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture
        .server
        .post("/documents")
        .json(&json!({"_id": "invoice-42", "total": 10}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["id"], "invoice-42");
    assert_eq!(fixture.cloudant.document_count(TEST_DB), 1);
}

#[tokio::test]
async fn test_create_duplicate_id_conflicts() {
    let fixture = common::setup_test_fixture().await.unwrap();
    fixture
        .cloudant
        .insert_document(TEST_DB, json!({"_id": "taken"}));

    let response = fixture
        .server
        .post("/documents")
        .json(&json!({"_id": "taken"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_rejects_missing_or_invalid_payload() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture.server.post("/documents").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid payload");

    let response = fixture.server.post("/documents").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = fixture.server.post("/documents").json(&json!([1, 2])).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = fixture.server.post("/documents").text("{not json").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert_eq!(fixture.cloudant.document_count(TEST_DB), 0);
    assert_eq!(fixture.cloudant.token_requests(), 0);
}

#[tokio::test]
async fn test_create_rejects_non_string_id() {
    let fixture = common::setup_test_fixture().await.unwrap();

    for id in [json!(42), json!(null), json!({"nested": true})] {
        let response = fixture
            .server
            .post("/documents")
            .json(&json!({"_id": id, "name": "x"}))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>(), json!({"error": "Invalid payload"}));
    }

    assert_eq!(fixture.cloudant.document_count(TEST_DB), 0);
    assert_eq!(fixture.cloudant.token_requests(), 0);
}

#[tokio::test]
async fn test_delete_with_repeated_rev_param_is_bad_request() {
    let fixture = common::setup_test_fixture().await.unwrap();
    let rev = fixture
        .cloudant
        .insert_document(TEST_DB, json!({"_id": "d", "name": "keep me"}));

    let response = fixture
        .server
        .delete("/documents/d")
        .add_query_param("rev", &rev)
        .add_query_param("rev", "1-other")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({"error": "Invalid payload"}));
    assert_eq!(fixture.cloudant.document_count(TEST_DB), 1);
    assert_eq!(fixture.cloudant.token_requests(), 0);
}

#[tokio::test]
async fn test_non_utf8_document_id_is_bad_request() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let get = fixture.server.get("/documents/%FF").await;
    let put = fixture
        .server
        .put("/documents/%FF")
        .json(&json!({"name": "x"}))
        .await;
    let delete = fixture.server.delete("/documents/%FF").await;

    for response in [get, put, delete] {
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>(), json!({"error": "Invalid payload"}));
    }
    assert_eq!(fixture.cloudant.token_requests(), 0);
}

#[tokio::test]
async fn test_list_documents_after_creates() {
    let fixture = common::setup_test_fixture().await.unwrap();

    for i in 0..4 {
        let response = fixture
            .server
            .post("/documents")
            .json(&json!({"index": i}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let response = fixture.server.get("/documents").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let docs: Vec<Value> = response.json();
    assert!(docs.len() >= 4);
    for doc in &docs {
        assert!(doc["_id"].as_str().is_some());
        assert!(doc["_rev"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_list_empty_database() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture.server.get("/documents").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let docs: Vec<Value> = response.json();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_get_missing_document_is_not_found() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture.server.get("/documents/does-not-exist").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Document not found.");
}

#[tokio::test]
async fn test_update_merges_fields_and_bumps_revision() {
    let fixture = common::setup_test_fixture().await.unwrap();
    let first_rev = fixture.cloudant.insert_document(
        TEST_DB,
        json!({"_id": "profile", "name": "Ada", "role": "engineer"}),
    );

    let response = fixture
        .server
        .put("/documents/profile")
        .json(&json!({"role": "lead", "team": "storage", "_id": "hijack"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["message"], "Document updated successfully.");
    let document = &body["document"];
    assert_eq!(document["_id"], "profile");
    assert_eq!(document["name"], "Ada");
    assert_eq!(document["role"], "lead");
    assert_eq!(document["team"], "storage");
    let new_rev = document["_rev"].as_str().unwrap();
    assert_ne!(new_rev, first_rev);
    assert!(new_rev.starts_with("2-"));

    let stored: Value = fixture.server.get("/documents/profile").await.json();
    assert_eq!(stored["role"], "lead");
    assert_eq!(stored["_rev"], new_rev);
}

#[tokio::test]
async fn test_update_with_stale_revision_conflicts() {
    let fixture = common::setup_test_fixture().await.unwrap();
    let stale_rev = fixture
        .cloudant
        .insert_document(TEST_DB, json!({"_id": "counter", "n": 1}));

    let response = fixture
        .server
        .put("/documents/counter")
        .json(&json!({"n": 2}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = fixture
        .server
        .put("/documents/counter")
        .json(&json!({"n": 3, "_rev": stale_rev}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let stored: Value = fixture.server.get("/documents/counter").await.json();
    assert_eq!(stored["n"], 2);
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture
        .server
        .put("/documents/ghost")
        .json(&json!({"name": "x"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(fixture.cloudant.document_count(TEST_DB), 0);
}

#[tokio::test]
async fn test_update_rejects_non_object_payload() {
    let fixture = common::setup_test_fixture().await.unwrap();
    fixture
        .cloudant
        .insert_document(TEST_DB, json!({"_id": "doc"}));

    let response = fixture
        .server
        .put("/documents/doc")
        .json(&json!("just a string"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_with_stale_then_current_revision() {
    let fixture = common::setup_test_fixture().await.unwrap();
    let stale_rev = fixture
        .cloudant
        .insert_document(TEST_DB, json!({"_id": "temp", "v": 1}));

    let updated: Value = fixture
        .server
        .put("/documents/temp")
        .json(&json!({"v": 2}))
        .await
        .json();
    let current_rev = updated["document"]["_rev"].as_str().unwrap().to_string();

    let response = fixture
        .server
        .delete("/documents/temp")
        .add_query_param("rev", &stale_rev)
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(fixture.cloudant.document_count(TEST_DB), 1);

    let response = fixture
        .server
        .delete("/documents/temp")
        .add_query_param("rev", &current_rev)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["message"], "Document deleted successfully.");

    let response = fixture.server.get("/documents/temp").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_without_revision_looks_it_up() {
    let fixture = common::setup_test_fixture().await.unwrap();
    fixture
        .cloudant
        .insert_document(TEST_DB, json!({"_id": "lookup"}));

    let response = fixture.server.delete("/documents/lookup").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(fixture.cloudant.document_count(TEST_DB), 0);
}

#[tokio::test]
async fn test_delete_missing_document_is_not_found() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture.server.delete("/documents/nothing-here").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_every_operation_fetches_a_fresh_token() {
    let fixture = common::setup_test_fixture().await.unwrap();

    fixture
        .server
        .post("/documents")
        .json(&json!({"_id": "t"}))
        .await;
    fixture.server.get("/documents/t").await;
    fixture.server.get("/documents").await;

    assert_eq!(fixture.cloudant.token_requests(), 3);
}

#[tokio::test]
async fn test_invalid_api_key_fails_every_operation() {
    let fixture = common::setup_with_api_key("not-a-real-key").await.unwrap();
    fixture
        .cloudant
        .insert_document(TEST_DB, json!({"_id": "existing"}));

    let responses = vec![
        fixture.server.get("/documents").await,
        fixture
            .server
            .post("/documents")
            .json(&json!({"name": "Test"}))
            .await,
        fixture.server.get("/documents/existing").await,
        fixture
            .server
            .put("/documents/existing")
            .json(&json!({"name": "changed"}))
            .await,
        fixture.server.delete("/documents/existing").await,
    ];

    for response in responses {
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "Internal server error.");
    }

    assert_eq!(fixture.cloudant.document_count(TEST_DB), 1);
    let stored = fixture.cloudant.documents(TEST_DB);
    assert!(stored[0].get("name").is_none());
}

#[tokio::test]
async fn test_listing_a_missing_database_is_a_server_error() {
    let fixture = common::setup_test_fixture().await.unwrap();
    let mut config = (*fixture.state.config).clone();
    config.cloudant.db_name = "never_created".to_string();
    let state = document_api::AppState::new(config).unwrap();
    let server = axum_test::TestServer::new(document_api::create_app(state)).unwrap();

    let response = server.get("/documents").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_request_id_header_is_returned() {
    let fixture = common::setup_test_fixture().await.unwrap();

    let response = fixture.server.get("/health").await;

    assert!(response.headers().get("x-request-id").is_some());
}
