use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
