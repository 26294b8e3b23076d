pub const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
pub const IAM_APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Upper bound on how much of a remote error body is kept in an error.
pub const MAX_ERROR_BODY_BYTES: usize = 512;
