pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use auth::{BearerToken, IamTokenProvider, TokenProvider};
pub use client::CloudantClient;
pub use error::CloudantError;
pub use models::{AllDocsResponse, DatabaseCreation, DatabaseInfo, Document, DocumentAck};
