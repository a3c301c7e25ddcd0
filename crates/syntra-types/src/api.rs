use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Snippet;

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    Reviewer,
}

/// JWT claims shared by the REST middleware and the realtime gateway, which
/// decodes them only to label its logs. Tokens are issued elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Snippets --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetResponse {
    #[serde(flatten)]
    pub snippet: Snippet,
    /// Upper bound for `lineNumber` in realtime edits.
    pub line_count: usize,
    pub comment_count: usize,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: String,
    #[serde(default)]
    pub line: u32,
    pub snippet_id: String,
}
