#![allow(dead_code)]

use anyhow::Result;
use axum_test::TestServer;
use cloudant_client::testing::{MockCloudant, MOCK_API_KEY};
use document_api::config::{CloudantConfig, Config};
use document_api::{create_app, AppState};
use url::Url;

pub const TEST_DB: &str = "documents_test";

pub struct TestFixture {
    pub state: AppState,
    pub server: TestServer,
    pub cloudant: MockCloudant,
}

pub fn test_config(cloudant: &MockCloudant, api_key: &str) -> Result<Config> {
    Ok(Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        seed_empty_database: true,
        cloudant: CloudantConfig {
            api_key: api_key.to_string(),
            service_url: Url::parse(&cloudant.store_url())?,
            db_name: TEST_DB.to_string(),
            iam_token_url: cloudant.iam_token_url(),
        },
    })
}

/// Starts a mock Cloudant with an empty `TEST_DB` and a router pointed at it.
pub async fn setup_test_fixture() -> Result<TestFixture> {
    setup_with_api_key(MOCK_API_KEY).await
}

pub async fn setup_with_api_key(api_key: &str) -> Result<TestFixture> {
    let cloudant = MockCloudant::start().await?;
    cloudant.create_database(TEST_DB);

    let state = AppState::new(test_config(&cloudant, api_key)?)?;
    let server = TestServer::new(create_app(state.clone()))?;

    Ok(TestFixture {
        state,
        server,
        cloudant,
    })
}
