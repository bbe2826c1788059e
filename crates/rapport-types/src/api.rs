use serde::{Deserialize, Serialize};

// -- Writes --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default, alias = "userId")]
    pub actor_id: String,
    #[serde(default, alias = "reportedUserId")]
    pub target_id: String,
    #[serde(default)]
    pub message: String,
}

/// Body shared by like and dislike.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    #[serde(default, alias = "userId")]
    pub actor_id: String,
    #[serde(default, alias = "reportedUserId")]
    pub target_id: String,
}

// -- Responses --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
